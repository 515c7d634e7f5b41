use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::basket::BasketStore;
use crate::errors::ClientError;
use crate::gateway::Gateway;
use crate::options::ClientOptions;
use crate::router::{History, Navigation, Navigator, Router};
use crate::session::Session;
use crate::storage::{CredentialStore, FileStore, MemoryStore};
use crate::structs::basket::Basket;
use crate::structs::user::Claims;
use crate::timer::{Clock, SystemClock};
use crate::transport::{HttpTransport, Transport};

/// Cocktail client. Owns the session context and hands it to the gateway, the
/// basket and the router on every call.
#[derive(Debug)]
pub struct Client {
    gateway: Gateway,
    session: Session,
    basket: BasketStore,
    router: Router,
    debug: bool,
}

impl Client {
    /// Creates a new client talking to `options.base_url`.
    ///
    /// The session is restored from the credential file when `storage_path` is set,
    /// and the basket is fetched if that session is still valid.
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let base_url = options.validate()?;
        let transport = HttpTransport::new(base_url)?;

        let store: Box<dyn CredentialStore> = match &options.storage_path {
            Some(path) => Box::new(FileStore::new(path)),
            None => Box::new(MemoryStore::new()),
        };

        Self::with_parts(
            options,
            Box::new(transport),
            store,
            Box::new(SystemClock),
            Box::new(History::new()),
        )
    }

    /// Creates a client from explicit collaborators.
    pub fn with_parts(
        options: ClientOptions,
        transport: Box<dyn Transport>,
        store: Box<dyn CredentialStore>,
        clock: Box<dyn Clock>,
        navigator: Box<dyn Navigator>,
    ) -> Result<Self, ClientError> {
        options.validate()?;

        let gateway = Gateway::new(transport, options.auth_header.clone());
        let mut session = Session::new(&options, store, clock, navigator)?;

        let basket = if session.is_authenticated() {
            BasketStore::load(&gateway, &mut session, options.debug)
        } else {
            BasketStore::new(options.debug)
        };

        info!(
            authenticated = session.is_authenticated(),
            "client initialized"
        );

        Ok(Self {
            gateway,
            session,
            basket,
            router: Router::default(),
            debug: options.debug,
        })
    }

    /// Logs in, then refreshes the basket of the new user.
    pub fn login(&mut self, identifier: &str, secret: &str) -> Result<Claims, ClientError> {
        let claims = self
            .session
            .login(&self.gateway, identifier, secret)?
            .clone();

        // The login stands even if the basket cannot be loaded yet
        if let Err(err) = self.basket.fetch(&self.gateway, &mut self.session) {
            warn!(error = %err, "basket fetch after login failed, kept in basket().error()");
        }

        Ok(claims)
    }

    /// Logs out and forgets the basket mirror.
    pub fn logout(&mut self) {
        self.session.logout();
        self.basket = BasketStore::new(self.debug);
    }

    /// Records a path to replay after the next login.
    pub fn set_return_url(&mut self, path: &str) {
        self.session.set_return_url(path);
    }

    /// Guarded navigation to `path`.
    pub fn navigate(&mut self, path: &str) -> Navigation {
        self.router.navigate(&mut self.session, path)
    }

    /// Runs due timers; call this from the host's event loop.
    pub fn poll_timers(&mut self) -> usize {
        let fired = self.session.poll_timers();
        if fired > 0 && !self.session.is_authenticated() {
            self.basket = BasketStore::new(self.debug);
        }
        fired
    }

    pub fn fetch_basket(&mut self) -> Result<Option<&Basket>, ClientError> {
        let result = self
            .basket
            .fetch(&self.gateway, &mut self.session)
            .map(|_| ());
        self.drop_basket_if_ended();
        result.map(|()| self.basket.basket())
    }

    pub fn add_to_basket(
        &mut self,
        cocktail_id: i64,
        size_id: i64,
        quantity: u32,
    ) -> Result<(), ClientError> {
        let result = self
            .basket
            .add(&self.gateway, &mut self.session, cocktail_id, size_id, quantity);
        self.drop_basket_if_ended();
        result
    }

    pub fn update_quantity(
        &mut self,
        cocktail_id: i64,
        size_id: i64,
        quantity: u32,
    ) -> Result<(), ClientError> {
        let result = self
            .basket
            .update_quantity(&self.gateway, &mut self.session, cocktail_id, size_id, quantity);
        self.drop_basket_if_ended();
        result
    }

    pub fn remove_from_basket(&mut self, cocktail_id: i64, size_id: i64) -> Result<(), ClientError> {
        let result = self
            .basket
            .remove(&self.gateway, &mut self.session, cocktail_id, size_id);
        self.drop_basket_if_ended();
        result
    }

    pub fn clear_basket(&mut self) -> Result<(), ClientError> {
        let result = self.basket.clear(&self.gateway, &mut self.session);
        self.drop_basket_if_ended();
        result
    }

    pub fn convert_to_order(&mut self) -> Result<(), ClientError> {
        let result = self.basket.convert_to_order(&self.gateway, &mut self.session);
        self.drop_basket_if_ended();
        result
    }

    // A 401 during a basket call ends the session; the mirror goes with it.
    fn drop_basket_if_ended(&mut self) {
        if !self.session.is_authenticated() && self.basket.basket().is_some() {
            self.basket = BasketStore::new(self.debug);
        }
    }

    pub fn cart_count(&self) -> u32 {
        self.basket.cart_count()
    }

    pub fn cart_total(&self) -> Decimal {
        self.basket.cart_total()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable access for role-aware hosts that drain notices or re-arm timers.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn basket(&self) -> &BasketStore {
        &self.basket
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }
}
