use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{Order, Polygon, Product, TimeRange};
use crate::error::SatfetchError;
use crate::time::{Windows, windows};

#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub items: Vec<Product>,
    pub total: u64,
}

pub trait CatalogClient: Send + Sync {
    fn search(
        &self,
        range: &TimeRange,
        geo: Option<&Polygon>,
    ) -> Result<SearchResults, SatfetchError>;

    fn count(&self, range: &TimeRange, geo: Option<&Polygon>) -> Result<u64, SatfetchError> {
        Ok(self.search(range, geo)?.total)
    }
}

impl<T: CatalogClient + ?Sized> CatalogClient for Arc<T> {
    fn search(
        &self,
        range: &TimeRange,
        geo: Option<&Polygon>,
    ) -> Result<SearchResults, SatfetchError> {
        (**self).search(range, geo)
    }

    fn count(&self, range: &TimeRange, geo: Option<&Polygon>) -> Result<u64, SatfetchError> {
        (**self).count(range, geo)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub window: TimeRange,
    pub items: Vec<Product>,
    pub count: u64,
}

impl Batch {
    pub fn new(window: TimeRange, mut items: Vec<Product>, order: Order) -> Self {
        items.sort_by(|a, b| compare_sensing(a.sensing_start, b.sensing_start, order));
        let count = items.len() as u64;
        Self {
            window,
            items,
            count,
        }
    }
}

fn compare_sensing(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>, order: Order) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match order {
            Order::Ascending => a.cmp(&b),
            Order::Descending => b.cmp(&a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountMismatch {
    pub expected: u64,
    pub retrieved: u64,
}

impl fmt::Display for CountMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {} items but retrieved {}",
            self.expected, self.retrieved
        )
    }
}

pub struct TimeWindowBatcher<'a, C: CatalogClient> {
    catalog: &'a C,
    window: TimeDelta,
    order: Order,
    item_order: Order,
    geo: Option<Polygon>,
    expected_total: Option<u64>,
}

impl<'a, C: CatalogClient> TimeWindowBatcher<'a, C> {
    pub fn new(catalog: &'a C, window: TimeDelta) -> Self {
        Self {
            catalog,
            window,
            order: Order::Descending,
            item_order: Order::Descending,
            geo: None,
            expected_total: None,
        }
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn item_order(mut self, order: Order) -> Self {
        self.item_order = order;
        self
    }

    pub fn geo(mut self, polygon: Polygon) -> Self {
        self.geo = Some(polygon);
        self
    }

    pub fn expected_total(mut self, expected: u64) -> Self {
        self.expected_total = Some(expected);
        self
    }

    pub fn run(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Batches<'a, C>, SatfetchError> {
        let windows = windows(start, end, self.window, self.order)?;
        let expected = match self.expected_total {
            Some(expected) => expected,
            None if start == end => 0,
            None => {
                let range = TimeRange::new(start, end)?;
                self.catalog.count(&range, self.geo.as_ref())?
            }
        };
        info!(
            %start,
            %end,
            window = %self.window,
            expected,
            "fetch period=['{start}', '{end}') in batches"
        );
        Ok(Batches {
            catalog: self.catalog,
            windows,
            geo: self.geo.clone(),
            item_order: self.item_order,
            start,
            end,
            expected,
            retrieved: 0,
            finished: false,
            mismatch: None,
        })
    }
}

/// Lazy sequence of per-window batches produced by [`TimeWindowBatcher::run`].
///
/// Each `next` issues exactly one catalog search. A failed search is yielded
/// and ends the sequence.
pub struct Batches<'a, C: CatalogClient> {
    catalog: &'a C,
    windows: Windows,
    geo: Option<Polygon>,
    item_order: Order,
    start: NaiveDateTime,
    end: NaiveDateTime,
    expected: u64,
    retrieved: u64,
    finished: bool,
    mismatch: Option<CountMismatch>,
}

impl<C: CatalogClient> Batches<'_, C> {
    pub fn expected(&self) -> u64 {
        self.expected
    }

    pub fn retrieved(&self) -> u64 {
        self.retrieved
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Set once the sequence completed and the retrieved total differs from the expected one.
    pub fn mismatch(&self) -> Option<CountMismatch> {
        self.mismatch
    }

    fn complete(&mut self) {
        self.finished = true;
        info!(
            retrieved = self.retrieved,
            "fetch period=['{}', '{}'): retrieved {} items in total",
            self.start,
            self.end,
            self.retrieved
        );
        if self.expected != self.retrieved {
            let mismatch = CountMismatch {
                expected: self.expected,
                retrieved: self.retrieved,
            };
            warn!(
                expected = mismatch.expected,
                retrieved = mismatch.retrieved,
                "{mismatch}"
            );
            self.mismatch = Some(mismatch);
        }
    }
}

impl<C: CatalogClient> Iterator for Batches<'_, C> {
    type Item = Result<Batch, SatfetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let Some(window) = self.windows.next() else {
            self.complete();
            return None;
        };
        info!(%window, "fetch period={window}");
        match self.catalog.search(&window, self.geo.as_ref()) {
            Ok(results) => {
                let batch = Batch::new(window, results.items, self.item_order);
                self.retrieved += batch.count;
                info!(count = batch.count, "fetch period={window}: retrieved {} items", batch.count);
                Some(Ok(batch))
            }
            Err(err) => {
                self.finished = true;
                warn!(%window, error = %err, "catalog search failed");
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProductId;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn batch_sorts_items_by_sensing_time() {
        let window = TimeRange::new(at(0), at(6)).unwrap();
        let items = vec![
            Product::new("a".parse::<ProductId>().unwrap()).with_sensing_start(at(1)),
            Product::new("b".parse::<ProductId>().unwrap()),
            Product::new("c".parse::<ProductId>().unwrap()).with_sensing_start(at(3)),
        ];
        let batch = Batch::new(window, items, Order::Descending);
        let ids = batch
            .items
            .iter()
            .map(|item| item.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(batch.count, 3);
    }
}
