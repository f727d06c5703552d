pub mod browser;
pub mod cascade;
pub mod contact;
pub mod detail;
pub mod fetch;
pub mod fields;
pub mod page;
pub mod pagination;
pub mod privateproperty;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use browser::ChromeRenderer;
pub use contact::ContactRevealer;
pub use detail::DetailExtractor;
pub use fetch::{FetchStrategySelector, ReqwestTransport};
pub use page::{ExtractorRegistry, PageExtractor};
pub use pagination::PaginationNavigator;
pub use traits::{CardExtractor, HttpTransport, LivePage, Renderer};
