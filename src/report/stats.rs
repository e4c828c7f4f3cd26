//! Price statistics over a product set.

use crate::daraz::Product;
use serde::{Deserialize, Serialize};

/// Summary statistics; every field but `count` is `None` for an empty set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    /// Unrounded arithmetic mean
    pub average: Option<f64>,
}

impl Stats {
    pub fn empty() -> Self {
        Self { count: 0, min: None, max: None, median: None, average: None }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Computes count, min, max, median and average of product prices.
pub fn aggregate(products: &[Product]) -> Stats {
    if products.is_empty() {
        return Stats::empty();
    }

    let mut prices: Vec<f64> = products.iter().map(|p| p.price).collect();
    prices.sort_by(f64::total_cmp);

    let count = prices.len();
    let mid = count / 2;
    let median = if count % 2 == 1 { prices[mid] } else { (prices[mid - 1] + prices[mid]) / 2.0 };
    let sum: f64 = prices.iter().sum();

    Stats {
        count,
        min: prices.first().copied(),
        max: prices.last().copied(),
        median: Some(median),
        average: Some(sum / count as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priced(prices: &[f64]) -> Vec<Product> {
        prices
            .iter()
            .enumerate()
            .map(|(i, price)| Product::new(i.to_string(), "Listing", *price))
            .collect()
    }

    #[test]
    fn test_empty_set() {
        let stats = aggregate(&[]);
        assert_eq!(stats.count, 0);
        assert!(stats.min.is_none());
        assert!(stats.max.is_none());
        assert!(stats.median.is_none());
        assert!(stats.average.is_none());
        assert!(stats.is_empty());
    }

    #[test]
    fn test_median_odd() {
        let stats = aggregate(&priced(&[300.0, 100.0, 500.0, 200.0, 400.0]));
        assert_eq!(stats.median, Some(300.0));
        assert_eq!(stats.min, Some(100.0));
        assert_eq!(stats.max, Some(500.0));
        assert_eq!(stats.average, Some(300.0));
    }

    #[test]
    fn test_median_even() {
        let stats = aggregate(&priced(&[100.0, 200.0, 300.0, 400.0]));
        assert_eq!(stats.count, 4);
        assert_eq!(stats.median, Some(250.0));
    }

    #[test]
    fn test_single_product() {
        let stats = aggregate(&priced(&[349.0]));
        assert_eq!(stats.min, Some(349.0));
        assert_eq!(stats.max, Some(349.0));
        assert_eq!(stats.median, Some(349.0));
        assert_eq!(stats.average, Some(349.0));
    }

    #[test]
    fn test_average_not_rounded() {
        let stats = aggregate(&priced(&[100.0, 100.0, 101.0]));
        let average = stats.average.unwrap();
        assert!((average - 100.333_333).abs() < 1e-5);
    }

    #[test]
    fn test_ordering_bounds() {
        let sets: [&[f64]; 4] = [
            &[1.0],
            &[5.0, 5.0, 5.0],
            &[999.0, 1.0, 20.0, 20.0, 3.5, 0.0],
            &[120.0, 80.0, 1500.0, 349.0, 349.0, 210.0, 95.5],
        ];

        for prices in sets {
            let stats = aggregate(&priced(prices));
            let (min, max) = (stats.min.unwrap(), stats.max.unwrap());
            let (median, average) = (stats.median.unwrap(), stats.average.unwrap());
            assert!(min <= median && median <= max, "median out of range for {:?}", prices);
            assert!(min <= average && average <= max, "average out of range for {:?}", prices);
        }
    }

    #[test]
    fn test_stats_serialize_nulls() {
        let json = serde_json::to_value(Stats::empty()).unwrap();
        assert_eq!(json["count"], 0);
        assert!(json["min"].is_null());
        assert!(json["average"].is_null());
    }
}
