//! Known columns of the candidate table and the derived-feature formulas.

/// Label column required for training.
pub const TARGET_COLUMN: &str = "target";

/// Suffix of boolean missingness-flag columns (e.g. `planet_radius_missing`).
pub const MISSING_FLAG_SUFFIX: &str = "_missing";

/// Returns true for boolean missingness-flag columns; these are never features.
pub fn is_missing_flag(name: &str) -> bool {
    name.len() > MISSING_FLAG_SUFFIX.len() && name.ends_with(MISSING_FLAG_SUFFIX)
}

/// Raw measurement columns uploaded by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RawColumn {
    OrbitalPeriod,
    TransitDuration,
    TransitDepth,
    PlanetRadius,
    StellarRadius,
    StellarTemp,
    EquilibriumTemp,
    InsolationFlux,
    KoiModelSnr,
    Ra,
    Dec,
}

impl RawColumn {
    pub const COUNT: usize = 11;

    pub const ALL: [RawColumn; Self::COUNT] = [
        RawColumn::OrbitalPeriod,
        RawColumn::TransitDuration,
        RawColumn::TransitDepth,
        RawColumn::PlanetRadius,
        RawColumn::StellarRadius,
        RawColumn::StellarTemp,
        RawColumn::EquilibriumTemp,
        RawColumn::InsolationFlux,
        RawColumn::KoiModelSnr,
        RawColumn::Ra,
        RawColumn::Dec,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            RawColumn::OrbitalPeriod => "orbital_period",
            RawColumn::TransitDuration => "transit_duration",
            RawColumn::TransitDepth => "transit_depth",
            RawColumn::PlanetRadius => "planet_radius",
            RawColumn::StellarRadius => "stellar_radius",
            RawColumn::StellarTemp => "stellar_temp",
            RawColumn::EquilibriumTemp => "equilibrium_temp",
            RawColumn::InsolationFlux => "insolation_flux",
            RawColumn::KoiModelSnr => "koi_model_snr",
            RawColumn::Ra => "ra",
            RawColumn::Dec => "dec",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|column| column.name() == name)
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// How a derived column combines its two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Ratio,
    Product,
}

impl Operation {
    /// Apply the operation; `None` for a zero divisor or a non-finite result.
    pub fn apply(self, lhs: f64, rhs: f64) -> Option<f64> {
        let value = match self {
            Operation::Ratio => {
                if rhs == 0.0 {
                    return None;
                }
                lhs / rhs
            }
            Operation::Product => lhs * rhs,
        };
        value.is_finite().then_some(value)
    }
}

/// Columns computed from pairs of raw columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DerivedColumn {
    RadiusRatio,
    DurationPeriodRatio,
    DepthSnrRatio,
    TempRatio,
    InsolationRadiusRatio,
    RadiusDepthProduct,
    SnrDurationProduct,
    PeriodInsolationProduct,
    StellarRadiusTempProduct,
    RaDecProduct,
}

impl DerivedColumn {
    pub const COUNT: usize = 10;

    pub const ALL: [DerivedColumn; Self::COUNT] = [
        DerivedColumn::RadiusRatio,
        DerivedColumn::DurationPeriodRatio,
        DerivedColumn::DepthSnrRatio,
        DerivedColumn::TempRatio,
        DerivedColumn::InsolationRadiusRatio,
        DerivedColumn::RadiusDepthProduct,
        DerivedColumn::SnrDurationProduct,
        DerivedColumn::PeriodInsolationProduct,
        DerivedColumn::StellarRadiusTempProduct,
        DerivedColumn::RaDecProduct,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            DerivedColumn::RadiusRatio => "radius_ratio",
            DerivedColumn::DurationPeriodRatio => "duration_period_ratio",
            DerivedColumn::DepthSnrRatio => "depth_snr_ratio",
            DerivedColumn::TempRatio => "temp_ratio",
            DerivedColumn::InsolationRadiusRatio => "insolation_radius_ratio",
            DerivedColumn::RadiusDepthProduct => "radius_depth_product",
            DerivedColumn::SnrDurationProduct => "snr_duration_product",
            DerivedColumn::PeriodInsolationProduct => "period_insolation_product",
            DerivedColumn::StellarRadiusTempProduct => "stellar_radius_temp_product",
            DerivedColumn::RaDecProduct => "ra_dec_product",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|column| column.name() == name)
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// `(lhs, operation, rhs)` for this column.
    pub const fn formula(self) -> (RawColumn, Operation, RawColumn) {
        use Operation::{Product, Ratio};
        use RawColumn::*;

        match self {
            DerivedColumn::RadiusRatio => (PlanetRadius, Ratio, StellarRadius),
            DerivedColumn::DurationPeriodRatio => (TransitDuration, Ratio, OrbitalPeriod),
            DerivedColumn::DepthSnrRatio => (TransitDepth, Ratio, KoiModelSnr),
            DerivedColumn::TempRatio => (EquilibriumTemp, Ratio, StellarTemp),
            DerivedColumn::InsolationRadiusRatio => (InsolationFlux, Ratio, PlanetRadius),
            DerivedColumn::RadiusDepthProduct => (PlanetRadius, Product, TransitDepth),
            DerivedColumn::SnrDurationProduct => (KoiModelSnr, Product, TransitDuration),
            DerivedColumn::PeriodInsolationProduct => (OrbitalPeriod, Product, InsolationFlux),
            DerivedColumn::StellarRadiusTempProduct => (StellarRadius, Product, StellarTemp),
            DerivedColumn::RaDecProduct => (Ra, Product, Dec),
        }
    }
}

/// Classification of a column name against the known schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Raw(RawColumn),
    Derived(DerivedColumn),
    Target,
    Passthrough,
}

impl ColumnKind {
    pub fn classify(name: &str) -> Self {
        if name == TARGET_COLUMN {
            ColumnKind::Target
        } else if let Some(raw) = RawColumn::from_name(name) {
            ColumnKind::Raw(raw)
        } else if let Some(derived) = DerivedColumn::from_name(name) {
            ColumnKind::Derived(derived)
        } else {
            ColumnKind::Passthrough
        }
    }

    /// Raw and derived columns are the only candidate features.
    pub fn is_feature(self) -> bool {
        matches!(self, ColumnKind::Raw(_) | ColumnKind::Derived(_))
    }
}
