pub mod api_key;
pub mod rate_limit;
pub mod team;
pub mod user;

pub use api_key::{ApiKey, ApiKeySummary};
pub use rate_limit::RateLimitWindow;
pub use team::{Membership, Role, Team};
pub use user::{SanitizedUser, User};

/// BSON serde helper for `Option<DateTime<Utc>>` fields, since the driver
/// only ships a helper for the non-optional case.
pub mod optional_chrono_datetime_as_bson_datetime {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(val: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match val {
            Some(date) => {
                mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime::serialize(
                    date, serializer,
                )
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper(
            #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
            DateTime<Utc>,
        );

        let wrapper = Option::<Wrapper>::deserialize(deserializer)?;
        Ok(wrapper.map(|w| w.0))
    }
}
