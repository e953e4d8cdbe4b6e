/// Authentication utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: session token generation and validation
/// - [`middleware`]: bearer token extraction and the per-request [`middleware::AuthContext`]
/// - [`oauth`]: Google, GitHub and Facebook authorization-code login
///
/// # Example
///
/// ```no_run
/// use taskflow_shared::auth::password::{hash_password, verify_password};
/// use taskflow_shared::auth::jwt::{create_token, validate_token, Claims};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Sup3r$ecret")?;
/// assert!(verify_password("Sup3r$ecret", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), chrono::Duration::days(7));
/// let token = create_token(&claims, "secret-key-at-least-32-bytes-long!!")?;
/// let validated = validate_token(&token, "secret-key-at-least-32-bytes-long!!")?;
/// assert_eq!(validated.sub, claims.sub);
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod oauth;
pub mod password;
