pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, Registration};
pub use auth_service_impl::SeaOrmAuthService;

pub mod blog_service;
pub mod blog_service_impl;
pub use blog_service::{BlogError, BlogService};
pub use blog_service_impl::SeaOrmBlogService;

pub mod relay;
pub use relay::{OAuthRelay, RelayError};

pub mod throttle;
pub use throttle::{LoginThrottle, ThrottleDecision};

pub mod totp;
pub use totp::{Provisioning, TotpService};
