//! # cqapi-translate
//!
//! Cross-dataset translation of cohort queries.
//!
//! Datasets of the same service share most of their concept catalog but
//! differ in the dataset segment of every identifier and in which concepts,
//! tables, selects and filters exist. This crate rewrites a query tree
//! built against one dataset so it runs on another, dropping whatever has
//! no counterpart and recording every drop.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cqapi_translate::{Connection, Translator};
//!
//! let translator = Translator::new(&connection);
//! let catalog = connection.get_concepts("dataset2")?;
//!
//! let outcome = translator.translate(&query, &catalog)?;
//! if let Some(translated) = &outcome.translated {
//!     connection.execute_query("dataset2", &translated.to_wire(), None)?;
//! }
//! for label in outcome.removed.resolve_labels(&original_catalog)? {
//!     println!("{} / {:?}: {:?}", label.concept, label.connector, label.label);
//! }
//! ```
//!
//! ## With Configuration
//!
//! ```ignore
//! use cqapi_translate::{CacheConfig, Translator, TranslatorConfig};
//!
//! let config = TranslatorConfig::builder()
//!     .with_cache(CacheConfig::default())
//!     .with_parallel(true)
//!     .build();
//!
//! let translator = Translator::with_config(&connection, config);
//! let batch = translator.translate_all(&queries, &catalog)?;
//! ```
//!
//! ## Translation Rules
//!
//! | Node | Result |
//! |------|--------|
//! | `CONCEPT` | surviving ids, selects and tables; nothing if no id or no table survives |
//! | table | dropped on unknown connector; loses unknown selects, filters, date column |
//! | `DATE_RESTRICTION`, `NEGATION`, root wrappers | wrap the translated child |
//! | `AND`, `OR` | surviving children; nothing if none survive |
//! | `SAVED_QUERY`, `EXTERNAL` | error |
//! | export forms | error |
//!
//! ## Feature Flags
//!
//! - `parallel` - Enables parallel batch translation using rayon

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod cache;
mod config;
mod error;
mod lookup;
mod planner;
mod removed;
mod result;
mod traits;
mod translator;

pub use cache::{CacheStats, ListingCache};
pub use config::{CacheConfig, TranslatorConfig, TranslatorConfigBuilder};
pub use error::{TranslateError, TranslateResult};
pub use lookup::find_concept_id;
pub use planner::{DescendantPlan, RootGroup};
pub use removed::{RemovedIdentifier, RemovedIdentifiers, RemovedKind, ResolvedLabel};
pub use result::{BatchOutcome, StoredQueryTranslation, TranslationOutcome, TranslationStats};
pub use traits::{ConceptListingEntry, Connection, ConnectionError};
pub use translator::Translator;
