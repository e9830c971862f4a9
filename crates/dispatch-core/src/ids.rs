use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(RestaurantId);
id_newtype!(OrderId);
id_newtype!(UserId);
id_newtype!(AgentId);

/// Address of an order document: `restaurants/{restaurant_id}/orders/{order_id}`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderKey {
    pub restaurant_id: RestaurantId,
    pub order_id: OrderId,
}

impl OrderKey {
    pub fn new(restaurant_id: impl Into<RestaurantId>, order_id: impl Into<OrderId>) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            order_id: order_id.into(),
        }
    }

    pub fn path(&self) -> String {
        format!("restaurants/{}/orders/{}", self.restaurant_id, self.order_id)
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(OrderId::new(), OrderId::new());
    }

    #[test]
    fn order_key_path_is_restaurant_scoped() {
        let key = OrderKey::new("r1", "o9");
        assert_eq!(key.path(), "restaurants/r1/orders/o9");
    }
}
