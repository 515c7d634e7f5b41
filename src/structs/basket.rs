use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Basket snapshot as returned by `GET /api/basket`. Totals are computed by the server.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Basket {
    pub id: i64,
    pub basket_lines: Vec<BasketLine>,
    pub is_archived: bool,
    /// Set once the basket has been turned into an order.
    pub is_converted: bool,
    pub total_amount: Decimal,
    pub total_items: u32,
    /// The user owning the basket.
    pub user: Option<BasketUser>,
}

impl Basket {
    /// The line for a cocktail in a given size. The server keeps that pair unique.
    pub fn line(&self, cocktail_id: i64, size_id: i64) -> Option<&BasketLine> {
        self.basket_lines
            .iter()
            .find(|l| l.cocktail.id == cocktail_id && l.cocktail_size.id == size_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketLine {
    pub id: i64,
    pub cocktail: Cocktail,
    pub cocktail_size: CocktailSize,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cocktail {
    pub id: i64,
    pub name: String,
}

/// A size variant of a cocktail ("S", "M", "L") with its own price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocktailSize {
    pub id: i64,
    pub size: String,
    pub price: Decimal,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BasketUser {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub enabled: bool,
    pub username: String,
    pub account_non_expired: bool,
    pub account_non_locked: bool,
    pub credentials_non_expired: bool,
    pub authorities: Vec<Authority>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authority {
    pub authority: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[test]
    fn decodes_server_snapshot() -> TestResult {
        let basket: Basket = serde_json::from_str(
            r#"{
                "id": 3,
                "basketLines": [{
                    "id": 10,
                    "cocktail": { "id": 4, "name": "Mojito" },
                    "cocktailSize": { "id": 2, "size": "M", "price": 8.5 },
                    "quantity": 2,
                    "unitPrice": 8.5
                }],
                "isArchived": false,
                "isConverted": false,
                "totalAmount": 17,
                "totalItems": 2,
                "user": {
                    "id": 1,
                    "email": "marie@example.com",
                    "role": "USER",
                    "enabled": true,
                    "username": "marie",
                    "authorities": [{ "authority": "ROLE_USER" }]
                }
            }"#,
        )?;

        assert_eq!(basket.total_amount, Decimal::new(17, 0));
        assert_eq!(basket.total_items, 2);
        assert_eq!(basket.line(4, 2).map(|l| l.unit_price), Some(Decimal::new(85, 1)));
        assert_eq!(basket.line(4, 3), None);
        assert_eq!(
            basket.user.map(|u| u.authorities),
            Some(vec![Authority {
                authority: "ROLE_USER".to_string()
            }])
        );
        Ok(())
    }
}
