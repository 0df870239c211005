//! Cookie-backed cart sessions.
//!
//! The browser holds a signed cart token in a cookie; each request gets a
//! [`CartSession`] that resolves the token to a cart at most once and records
//! whether a `Set-Cookie` has to go back with the response.

use crate::common::error::{Result, ShopError};
use crate::config::CartConfig;
use crate::domain::Cart;
use crate::metrics;
use crate::storage::Storage;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signer for cart tokens.
#[derive(Clone)]
pub struct CookieSigner {
    keyed: HmacSha256,
}

impl CookieSigner {
    pub fn new(secret: &SecretString) -> Result<Self> {
        let keyed = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|e| ShopError::Config(format!("Invalid cart secret: {e}")))?;
        Ok(Self { keyed })
    }

    fn mac(&self, message: &[u8]) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(message);
        mac
    }

    /// `"<uuid>.<hex mac>"`
    pub fn sign(&self, token: Uuid) -> String {
        let token = token.to_string();
        let tag = self.mac(token.as_bytes()).finalize().into_bytes();
        format!("{}.{}", token, hex::encode(tag))
    }

    /// The token carried by a signed value, or `None` when the value was tampered with.
    pub fn verify(&self, value: &str) -> Option<Uuid> {
        let (token, signature) = value.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        self.mac(token.as_bytes()).verify_slice(&signature).ok()?;
        Uuid::parse_str(token).ok()
    }
}

/// Cookie name, lifetime and flags for the cart cookie.
#[derive(Clone)]
pub struct CartCookies {
    pub name: String,
    pub days: i64,
    pub secure: bool,
    signer: CookieSigner,
}

impl CartCookies {
    pub fn from_config(config: &CartConfig) -> Result<Self> {
        Ok(Self {
            name: config.cookie_name.clone(),
            days: config.cookie_days,
            secure: config.cookie_secure,
            signer: CookieSigner::new(&config.secret)?,
        })
    }

    pub fn ttl(&self) -> Duration {
        Duration::days(self.days)
    }

    /// Verified cart token from a `Cookie` header value.
    pub fn read(&self, cookie_header: &str) -> Option<Uuid> {
        cookie_header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .and_then(|(_, value)| self.signer.verify(value.trim_matches('"')))
    }

    /// `Set-Cookie` value issuing `token`.
    pub fn set_cookie(&self, token: Uuid) -> String {
        let mut cookie = format!(
            "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
            self.name,
            self.signer.sign(token),
            self.ttl().num_seconds()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

#[derive(Default)]
struct SessionState {
    cart: Option<Cart>,
    issue: Option<Uuid>,
}

/// Request-scoped view of the caller's cart.
pub struct CartSession {
    incoming: Option<Uuid>,
    state: Mutex<SessionState>,
}

impl CartSession {
    pub fn new(incoming: Option<Uuid>) -> Self {
        Self {
            incoming,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// The caller's live cart, creating one when the cookie is missing, unknown
    /// or names an expired cart.
    pub async fn resolve(&self, storage: &dyn Storage, ttl: Duration) -> Result<Cart> {
        let mut state = self.state.lock().await;
        if let Some(cart) = &state.cart {
            return Ok(cart.clone());
        }

        let now = Utc::now();
        if let Some(token) = self.incoming {
            if let Some(cart) = storage.get_cart_by_token(token).await? {
                if !cart.is_expired(now) {
                    state.cart = Some(cart.clone());
                    return Ok(cart);
                }
                debug!("Cart {} expired, starting a new one", cart.id);
            }
        }

        let cart = storage.create_cart(now + ttl).await?;
        metrics::cart::created();
        debug!("Issued cart {} for token {}", cart.id, cart.token);
        state.issue = Some(cart.token);
        state.cart = Some(cart.clone());
        Ok(cart)
    }

    /// Slide the cart's expiry forward after a mutation and re-issue the cookie.
    pub async fn touch(&self, storage: &dyn Storage, ttl: Duration) -> Result<()> {
        let cart = self.resolve(storage, ttl).await?;
        let expires_at = Utc::now() + ttl;
        storage.touch_cart(cart.id, expires_at).await?;

        let mut state = self.state.lock().await;
        if let Some(cart) = state.cart.as_mut() {
            cart.expires_at = Some(expires_at);
        }
        state.issue = Some(cart.token);
        Ok(())
    }

    /// Token that needs a `Set-Cookie` on the way out, if any.
    pub async fn issued_token(&self) -> Option<Uuid> {
        self.state.lock().await.issue
    }
}

/// Delete carts whose expiry has passed; returns how many went.
pub async fn purge_expired(storage: &dyn Storage) -> Result<u64> {
    storage.purge_expired_carts(Utc::now()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    fn cookies() -> CartCookies {
        CartCookies::from_config(&CartConfig {
            secret: SecretString::new("test-secret".to_string()),
            ..CartConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn hmac_matches_rfc4231_vector() {
        // RFC 4231 test case 2
        let signer = CookieSigner::new(&SecretString::new("Jefe".to_string())).unwrap();
        let tag = signer.mac(b"what do ya want for nothing?").finalize().into_bytes();
        assert_eq!(
            hex::encode(tag),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn signed_token_round_trips_and_rejects_tampering() {
        let cookies = cookies();
        let token = Uuid::new_v4();
        let header = cookies.set_cookie(token);
        let value = header
            .split(';')
            .next()
            .and_then(|pair| pair.split_once('='))
            .map(|(_, v)| v.to_string())
            .unwrap();

        assert_eq!(cookies.read(&format!("other=1; fc_cart={value}")), Some(token));

        let forged = format!("{}.{}", Uuid::new_v4(), value.rsplit_once('.').unwrap().1);
        assert_eq!(cookies.read(&format!("fc_cart={forged}")), None);
        assert_eq!(cookies.read("fc_cart=garbage"), None);
    }

    #[test]
    fn truncated_or_extended_tags_are_rejected() {
        let signer = CookieSigner::new(&SecretString::new("test-secret".to_string())).unwrap();
        let token = Uuid::new_v4();
        let signed = signer.sign(token);
        assert_eq!(signer.verify(&signed), Some(token));
        assert_eq!(signer.verify(&signed[..signed.len() - 2]), None);
        assert_eq!(signer.verify(&format!("{signed}00")), None);
        assert_eq!(signer.verify(&format!("{token}.")), None);
    }

    #[test]
    fn set_cookie_carries_flags() {
        let mut cookies = cookies();
        let header = cookies.set_cookie(Uuid::new_v4());
        assert!(header.contains("Max-Age=2592000"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("SameSite=Lax"));
        assert!(!header.contains("Secure"));

        cookies.secure = true;
        assert!(cookies.set_cookie(Uuid::new_v4()).ends_with("; Secure"));
    }

    #[tokio::test]
    async fn resolve_creates_once_per_session() {
        let storage = InMemoryStorage::new();
        let session = CartSession::new(None);
        let first = session.resolve(&storage, Duration::days(30)).await.unwrap();
        let second = session.resolve(&storage, Duration::days(30)).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(session.issued_token().await, Some(first.token));
    }

    #[tokio::test]
    async fn resolve_reuses_live_cart_without_reissuing() {
        let storage = InMemoryStorage::new();
        let cart = storage
            .create_cart(Utc::now() + Duration::days(1))
            .await
            .unwrap();
        let session = CartSession::new(Some(cart.token));
        let resolved = session.resolve(&storage, Duration::days(30)).await.unwrap();
        assert_eq!(resolved.id, cart.id);
        assert_eq!(session.issued_token().await, None);
    }

    #[tokio::test]
    async fn expired_cart_is_replaced() {
        let storage = InMemoryStorage::new();
        let stale = storage
            .create_cart(Utc::now() - Duration::minutes(1))
            .await
            .unwrap();
        let session = CartSession::new(Some(stale.token));
        let fresh = session.resolve(&storage, Duration::days(30)).await.unwrap();
        assert_ne!(fresh.id, stale.id);
        assert_eq!(session.issued_token().await, Some(fresh.token));

        assert_eq!(purge_expired(&storage).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn touch_reissues_existing_cart() {
        let storage = InMemoryStorage::new();
        let cart = storage
            .create_cart(Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        let session = CartSession::new(Some(cart.token));
        session.touch(&storage, Duration::days(30)).await.unwrap();
        assert_eq!(session.issued_token().await, Some(cart.token));

        let stored = storage.get_cart_by_token(cart.token).await.unwrap().unwrap();
        assert!(stored.expires_at.unwrap() > Utc::now() + Duration::days(29));
    }
}
