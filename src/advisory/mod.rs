//! Deterministic agronomic lookups layered on top of a recommendation
//!
//! Irrigation scheduling, per-crop economics, and rotation planning all
//! work from fixed tables keyed by crop name, so they need no trained
//! model and answer instantly.

use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Seasonal water need and watering cadence for one crop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WaterRequirement {
    /// Total water per season, millimetres
    pub seasonal_need_mm: f64,
    /// Days between irrigation sessions
    pub interval_days: u32,
}

/// One planned watering session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrigationEvent {
    pub date: NaiveDate,
    /// Water to apply in this session, millimetres
    pub water_amount_mm: f64,
    pub area_hectares: f64,
}

const WATER_TABLE: &[(&str, f64, u32)] = &[
    ("rice", 1200.0, 2),
    ("maize", 500.0, 7),
    ("cotton", 700.0, 5),
    ("wheat", 450.0, 7),
    ("sugarcane", 1500.0, 3),
    ("coffee", 1800.0, 4),
    ("banana", 1200.0, 3),
    ("apple", 800.0, 5),
    ("orange", 900.0, 4),
    ("mango", 850.0, 5),
    ("chickpea", 350.0, 8),
    ("pigeonpeas", 400.0, 8),
    ("mothbeans", 300.0, 9),
    ("mungbean", 450.0, 7),
    ("blackgram", 500.0, 6),
    ("lentil", 350.0, 8),
    ("pomegranate", 650.0, 5),
    ("grapes", 700.0, 4),
    ("watermelon", 800.0, 3),
    ("muskmelon", 750.0, 4),
    ("papaya", 900.0, 3),
    ("coconut", 1200.0, 5),
    ("jute", 600.0, 6),
    ("kidneybeans", 400.0, 7),
];

/// 30-day irrigation planning from per-crop water requirements.
#[derive(Debug, Clone, Default)]
pub struct IrrigationScheduler;

impl IrrigationScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Water requirement for a crop, if known.
    pub fn requirement(&self, crop: &str) -> Option<WaterRequirement> {
        let crop = crop.to_lowercase();
        WATER_TABLE
            .iter()
            .find(|(name, _, _)| *name == crop)
            .map(|&(_, seasonal_need_mm, interval_days)| WaterRequirement {
                seasonal_need_mm,
                interval_days,
            })
    }

    /// 30-day schedule starting today. Returns `None` for unknown crops.
    pub fn schedule(
        &self,
        crop: &str,
        area_hectares: f64,
        rainfall_mm: f64,
    ) -> Option<Vec<IrrigationEvent>> {
        self.schedule_from(crop, area_hectares, rainfall_mm, Local::now().date_naive())
    }

    /// 30-day schedule starting at `start`.
    ///
    /// Expected rainfall is subtracted from the seasonal need before the
    /// deficit is spread over the month's sessions.
    pub fn schedule_from(
        &self,
        crop: &str,
        area_hectares: f64,
        rainfall_mm: f64,
        start: NaiveDate,
    ) -> Option<Vec<IrrigationEvent>> {
        let req = self.requirement(crop)?;
        let deficit = (req.seasonal_need_mm - rainfall_mm).max(0.0);
        let per_session = deficit / (30.0 / req.interval_days as f64);

        let events = (0..30u32)
            .filter(|day| day % req.interval_days == 0)
            .map(|day| IrrigationEvent {
                date: start + Duration::days(day as i64),
                water_amount_mm: round2(per_session),
                area_hectares,
            })
            .collect();
        Some(events)
    }
}

/// Cultivation cost, yield, and farm-gate price for one crop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CropEconomics {
    pub cost_per_hectare: f64,
    /// Average yield per hectare, tonnes (nuts for coconut)
    pub avg_yield: f64,
    pub price_per_kg: f64,
}

/// Projected economics of planting a crop over an area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicAnalysis {
    pub total_cost: f64,
    pub expected_yield: f64,
    pub expected_revenue: f64,
    pub expected_profit: f64,
    pub roi_percentage: f64,
}

const ECONOMICS_TABLE: &[(&str, f64, f64, f64)] = &[
    ("rice", 45000.0, 4.0, 20.0),
    ("maize", 35000.0, 5.5, 15.0),
    ("cotton", 55000.0, 2.5, 50.0),
    ("wheat", 40000.0, 3.5, 25.0),
    ("sugarcane", 65000.0, 70.0, 3.0),
    ("coffee", 75000.0, 2.0, 100.0),
    ("banana", 80000.0, 25.0, 12.0),
    ("apple", 90000.0, 15.0, 40.0),
    ("orange", 70000.0, 18.0, 25.0),
    ("mango", 85000.0, 12.0, 35.0),
    ("chickpea", 28000.0, 1.8, 60.0),
    ("pigeonpeas", 26000.0, 1.6, 65.0),
    ("mothbeans", 25000.0, 1.5, 70.0),
    ("mungbean", 30000.0, 1.7, 80.0),
    ("blackgram", 28000.0, 1.8, 75.0),
    ("lentil", 32000.0, 2.0, 70.0),
    ("pomegranate", 120000.0, 15.0, 50.0),
    ("grapes", 150000.0, 20.0, 45.0),
    ("watermelon", 60000.0, 35.0, 8.0),
    ("muskmelon", 55000.0, 30.0, 10.0),
    ("papaya", 75000.0, 40.0, 15.0),
    ("coconut", 100000.0, 12000.0, 15.0),
    ("jute", 40000.0, 2.5, 30.0),
    ("kidneybeans", 30000.0, 1.8, 60.0),
];

/// Cost/revenue projections from fixed per-crop economics.
#[derive(Debug, Clone, Default)]
pub struct EconomicAnalyzer;

impl EconomicAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn economics(&self, crop: &str) -> Option<CropEconomics> {
        let crop = crop.to_lowercase();
        ECONOMICS_TABLE
            .iter()
            .find(|(name, _, _, _)| *name == crop)
            .map(|&(_, cost_per_hectare, avg_yield, price_per_kg)| CropEconomics {
                cost_per_hectare,
                avg_yield,
                price_per_kg,
            })
    }

    /// Project cost, yield, revenue, profit, and ROI over `area_hectares`.
    /// Returns `None` for unknown crops.
    pub fn analyze(&self, crop: &str, area_hectares: f64) -> Option<EconomicAnalysis> {
        let eco = self.economics(crop)?;
        let total_cost = eco.cost_per_hectare * area_hectares;
        let expected_yield = eco.avg_yield * area_hectares;
        let revenue = expected_yield * eco.price_per_kg;
        let profit = revenue - total_cost;
        let roi = if total_cost > 0.0 {
            profit / total_cost * 100.0
        } else {
            0.0
        };

        Some(EconomicAnalysis {
            total_cost: round2(total_cost),
            expected_yield: round2(expected_yield),
            expected_revenue: round2(revenue),
            expected_profit: round2(profit),
            roi_percentage: round2(roi),
        })
    }
}

/// Growing season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Summer,
    Winter,
    Monsoon,
}

/// Soil-benefit category driving the rotation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CropCategory {
    /// Nitrogen fixing
    Legume,
    /// Soil structure
    Cereal,
    /// Economic value
    CashCrop,
}

const SUMMER_CROPS: &[&str] = &[
    "rice", "cotton", "maize", "sugarcane", "watermelon", "muskmelon", "papaya", "banana",
    "mungbean",
];
const WINTER_CROPS: &[&str] = &[
    "wheat", "chickpea", "lentil", "apple", "grapes", "pomegranate",
];
const MONSOON_CROPS: &[&str] = &[
    "rice", "maize", "blackgram", "mothbeans", "pigeonpeas", "kidneybeans", "coconut", "coffee",
    "banana", "papaya", "jute",
];

const LEGUMES: &[&str] = &[
    "chickpea", "lentil", "mungbean", "blackgram", "mothbeans", "pigeonpeas", "kidneybeans",
];
const CEREALS: &[&str] = &["rice", "wheat", "maize"];

/// Suggested rotation for one season.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationPlan {
    pub season: Season,
    /// In-season crops whose category benefits soil after the current crop
    pub suggestions: Vec<String>,
}

/// Rule-based crop rotation suggestions.
///
/// Legumes hand over to cereals or cash crops, cereals to legumes, and
/// everything else to legumes or cereals.
#[derive(Debug, Clone, Default)]
pub struct CropRotationPlanner;

impl CropRotationPlanner {
    pub fn new() -> Self {
        Self
    }

    fn seasonal_crops(season: Season) -> &'static [&'static str] {
        match season {
            Season::Summer => SUMMER_CROPS,
            Season::Winter => WINTER_CROPS,
            Season::Monsoon => MONSOON_CROPS,
        }
    }

    fn categorize(crop: &str) -> CropCategory {
        let crop = crop.to_lowercase();
        if LEGUMES.contains(&crop.as_str()) {
            CropCategory::Legume
        } else if CEREALS.contains(&crop.as_str()) {
            CropCategory::Cereal
        } else {
            CropCategory::CashCrop
        }
    }

    /// Suggest what to plant after `current_crop` in the given season.
    pub fn suggest(&self, current_crop: &str, season: Season) -> RotationPlan {
        let pool = Self::seasonal_crops(season);
        let wanted: &[CropCategory] = match Self::categorize(current_crop) {
            CropCategory::Legume => &[CropCategory::Cereal, CropCategory::CashCrop],
            CropCategory::Cereal => &[CropCategory::Legume],
            CropCategory::CashCrop => &[CropCategory::Legume, CropCategory::Cereal],
        };

        let suggestions = pool
            .iter()
            .filter(|crop| wanted.contains(&Self::categorize(crop)))
            .map(|crop| crop.to_string())
            .collect();

        RotationPlan {
            season,
            suggestions,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
