pub mod bucket;
pub mod series;

pub use bucket::{Granularity, floor, label, label_series, previous_label};
pub use series::{AdMeta, AdSeries, BucketCountRow, BucketSeries, align_series};
