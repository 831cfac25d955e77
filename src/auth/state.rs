//! Authentication state trait and macro.

use crate::jwt::JwtConfig;

/// Trait for state types that can verify access tokens.
pub trait HasTokenCodec {
    fn jwt(&self) -> &JwtConfig;
}

/// Macro to implement `HasTokenCodec` for state structs with a `jwt: Arc<JwtConfig>` field.
///
/// # Example
/// ```ignore
/// #[derive(Clone)]
/// pub struct MyState {
///     pub jwt: Arc<JwtConfig>,
/// }
///
/// impl_has_token_codec!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_token_codec {
    ($state_type:ty) => {
        impl $crate::auth::HasTokenCodec for $state_type {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }
        }
    };
}
