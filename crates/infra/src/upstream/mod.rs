//! Upstream marketplace boundary.
//!
//! [`UpstreamGateway`] is the raw request/response seam; [`MarketplaceClient`]
//! gives it typed operations; [`DeepLinkExtractor`] pulls the app payment URI
//! out of a payment page.

pub mod deeplink;
pub mod gateway;
pub mod http;
pub mod marketplace;
pub mod scripted;

pub use deeplink::DeepLinkExtractor;
pub use gateway::{GatewayError, Method, UpstreamGateway, UpstreamRequest, UpstreamResponse};
pub use http::HttpGateway;
pub use marketplace::{CreatedOrder, MarketplaceClient, UpstreamError, targets};
pub use scripted::ScriptedGateway;
