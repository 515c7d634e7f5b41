//! Client-side mirror of the server-owned basket.
//!
//! The snapshot is only ever replaced by a fresh `GET /api/basket`. Mutations
//! never touch it directly: each one is followed by a refetch, whether it
//! succeeded or not.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::errors::ClientError;
use crate::gateway::Gateway;
use crate::notices::{echo, Notice, NoticeLevel};
use crate::session::Session;
use crate::structs::basket::{Basket, BasketLine, BasketUser};
use crate::transport::ApiRequest;

const BASKET_PATH: &str = "/api/basket";

#[derive(Debug, Default)]
pub struct BasketStore {
    basket: Option<Basket>,
    is_loading: bool,
    error: Option<ClientError>,
    fetches: u64,
    debug: bool,
}

impl BasketStore {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }

    /// Creates the store and fetches the basket right away.
    pub fn load(gateway: &Gateway, session: &mut Session, debug: bool) -> Self {
        let mut store = Self::new(debug);
        if let Err(err) = store.fetch(gateway, session) {
            warn!(error = %err, "initial basket fetch failed, kept in error()");
        }
        store
    }

    /// Replaces the snapshot with the server's. On failure the previous snapshot is kept.
    pub fn fetch(&mut self, gateway: &Gateway, session: &mut Session) -> Result<&Basket, ClientError> {
        self.is_loading = true;
        self.error = None;

        let result = self.refetch(gateway, session);
        self.is_loading = false;

        match result {
            Ok(()) => self.basket.as_ref().ok_or(ClientError::FailedToDecode),
            Err(err) => Err(err),
        }
    }

    /// Adds `quantity` of a cocktail in a given size.
    pub fn add(
        &mut self,
        gateway: &Gateway,
        session: &mut Session,
        cocktail_id: i64,
        size_id: i64,
        quantity: u32,
    ) -> Result<(), ClientError> {
        let request = ApiRequest::post(format!("{BASKET_PATH}/add"))
            .query("cocktailId", cocktail_id)
            .query("cocktailSizeId", size_id)
            .query("quantity", quantity);

        self.mutate(gateway, session, request)
    }

    pub fn update_quantity(
        &mut self,
        gateway: &Gateway,
        session: &mut Session,
        cocktail_id: i64,
        size_id: i64,
        quantity: u32,
    ) -> Result<(), ClientError> {
        let request = ApiRequest::put(format!("{BASKET_PATH}/update"))
            .query("cocktailId", cocktail_id)
            .query("cocktailSizeId", size_id)
            .query("quantity", quantity);

        self.mutate(gateway, session, request)
    }

    /// Removes the line for a cocktail in a given size.
    pub fn remove(
        &mut self,
        gateway: &Gateway,
        session: &mut Session,
        cocktail_id: i64,
        size_id: i64,
    ) -> Result<(), ClientError> {
        let request = ApiRequest::delete(format!("{BASKET_PATH}/remove/{cocktail_id}/{size_id}"));

        self.mutate(gateway, session, request)
    }

    pub fn clear(&mut self, gateway: &Gateway, session: &mut Session) -> Result<(), ClientError> {
        self.mutate(gateway, session, ApiRequest::delete(format!("{BASKET_PATH}/clear")))
    }

    /// Turns the basket into an order. The refetched basket is the server's new one.
    pub fn convert_to_order(
        &mut self,
        gateway: &Gateway,
        session: &mut Session,
    ) -> Result<(), ClientError> {
        self.mutate(gateway, session, ApiRequest::post(format!("{BASKET_PATH}/convert")))?;
        self.notify(NoticeLevel::Success, "Order placed.");
        Ok(())
    }

    fn mutate(
        &mut self,
        gateway: &Gateway,
        session: &mut Session,
        request: ApiRequest,
    ) -> Result<(), ClientError> {
        self.is_loading = true;
        self.error = None;

        let path = request.path.clone();
        let sent = gateway.send(session, request).map(|_| ());

        if let Err(err) = &sent {
            warn!(path = %path, error = %err, "basket mutation failed");
        }

        // A call that ended the session leaves nothing to refresh
        let fetched = match &sent {
            Err(err) if err.ends_session() => Ok(()),
            _ => self.refetch(gateway, session),
        };
        self.is_loading = false;

        // The mutation's own error wins over the refetch's
        let result = sent.and(fetched);
        if let Err(err) = &result {
            self.error = Some(err.clone());
            if !err.ends_session() {
                self.notify(NoticeLevel::Error, &err.to_string());
            }
        }

        result
    }

    fn refetch(&mut self, gateway: &Gateway, session: &mut Session) -> Result<(), ClientError> {
        self.fetches += 1;

        match gateway.get_json::<Basket>(session, BASKET_PATH) {
            Ok(basket) => {
                debug!(
                    basket_id = basket.id,
                    lines = basket.basket_lines.len(),
                    total_items = basket.total_items,
                    "basket refreshed"
                );
                self.basket = Some(basket);
                Ok(())
            }
            Err(err) => {
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        if self.debug {
            echo("BASKET", &Notice::new(level, message));
        }
    }

    pub fn basket(&self) -> Option<&Basket> {
        self.basket.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Error of the last operation, cleared when the next one starts.
    pub fn error(&self) -> Option<&ClientError> {
        self.error.as_ref()
    }

    /// Number of basket fetches issued so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches
    }

    pub fn cart_count(&self) -> u32 {
        self.basket.as_ref().map_or(0, |b| b.total_items)
    }

    pub fn cart_total(&self) -> Decimal {
        self.basket.as_ref().map_or(Decimal::ZERO, |b| b.total_amount)
    }

    pub fn lines(&self) -> &[BasketLine] {
        self.basket
            .as_ref()
            .map(|b| b.basket_lines.as_slice())
            .unwrap_or(&[])
    }

    pub fn line(&self, cocktail_id: i64, size_id: i64) -> Option<&BasketLine> {
        self.basket.as_ref()?.line(cocktail_id, size_id)
    }

    pub fn current_user(&self) -> Option<&BasketUser> {
        self.basket.as_ref()?.user.as_ref()
    }
}
