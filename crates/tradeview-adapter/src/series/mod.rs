/*
[INPUT]:  Candle history pages and live candle ticks
[OUTPUT]: Gap-free, strictly time-ordered bar series per chart
[POS]:    Series layer - history/live merge engine
[UPDATE]: When changing merge rules or series wiring
*/

pub mod bar;
#[allow(clippy::module_inception)]
pub mod series;
pub mod view;

pub use bar::{Bar, Interval};
pub use series::{
    BackfillOutcome, BackfillRequest, DEFAULT_BACKFILL_THRESHOLD, DEFAULT_PAGE_SIZE, LiveMerge,
    PriceDirection, PriceTicker, TimeSeries,
};
pub use view::{CandleSource, SeriesView, SeriesViewOptions};
