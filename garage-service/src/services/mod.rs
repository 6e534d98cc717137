//! Services module for garage-service.

pub mod cache;
pub mod catalog;
pub mod customers;
pub mod database;
pub mod fanout;
pub mod garage_info;
pub mod invoices;
pub mod jobcards;
pub mod metrics;
pub mod migration;
pub mod numbering;
pub mod optimistic;
pub mod printable;
pub mod profit;
pub mod store;
pub mod totals;
pub mod workflow;

pub use cache::{paginate, Page, PageLimits, SnapshotCache};
pub use catalog::CatalogService;
pub use customers::CustomerService;
pub use database::MongoDb;
pub use fanout::{FanoutEvent, FanoutWriter, Partitioned};
pub use garage_info::GarageInfoService;
pub use invoices::InvoiceService;
pub use jobcards::JobCardService;
pub use metrics::{get_metrics, init_metrics};
pub use migration::{MigrationReport, Migrator};
pub use numbering::SequenceAllocator;
pub use optimistic::Optimistic;
pub use profit::ProfitService;
pub use store::{DocumentStore, InMemoryStore, Query, Snapshot, WriteBatch};
pub use totals::compute_totals;
