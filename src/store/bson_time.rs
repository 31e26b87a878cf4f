//! Serde adapters that store `chrono` timestamps as BSON datetimes, so Mongo
//! sorts and compares them as instants. Precision is cut to milliseconds.

use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

fn to_bson(dt: &DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

fn from_bson<E: serde::de::Error>(dt: BsonDateTime) -> Result<DateTime<Utc>, E> {
    DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
        .ok_or_else(|| E::custom(format!("timestamp {} out of range", dt.timestamp_millis())))
}

pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    to_bson(dt).serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    from_bson(BsonDateTime::deserialize(deserializer)?)
}

pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
        dt.as_ref().map(to_bson).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<BsonDateTime>::deserialize(deserializer)? {
            Some(dt) => from_bson::<D::Error>(dt).map(Some),
            None => Ok(None),
        }
    }
}
