use crate::cell::CellValue;
use serde::Serialize;

pub const EXCELLENT_THRESHOLD: f64 = 90.0;
pub const VERY_GOOD_THRESHOLD: f64 = 80.0;
pub const GOOD_THRESHOLD: f64 = 70.0;
pub const PASS_THRESHOLD: f64 = 55.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GradeBand {
    Excellent,
    VeryGood,
    Good,
    Fair,
    Weak,
    None,
}

impl GradeBand {
    pub const ALL: [GradeBand; 6] = [
        GradeBand::Excellent,
        GradeBand::VeryGood,
        GradeBand::Good,
        GradeBand::Fair,
        GradeBand::Weak,
        GradeBand::None,
    ];

    pub fn from_score(score: f64) -> GradeBand {
        if score >= EXCELLENT_THRESHOLD {
            GradeBand::Excellent
        } else if score >= VERY_GOOD_THRESHOLD {
            GradeBand::VeryGood
        } else if score >= GOOD_THRESHOLD {
            GradeBand::Good
        } else if score >= PASS_THRESHOLD {
            GradeBand::Fair
        } else {
            GradeBand::Weak
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GradeBand::Excellent => "excellent",
            GradeBand::VeryGood => "veryGood",
            GradeBand::Good => "good",
            GradeBand::Fair => "fair",
            GradeBand::Weak => "weak",
            GradeBand::None => "none",
        }
    }
}

/// Text grades such as "absent" land in `None`, never in `Weak`.
pub fn classify(value: &CellValue) -> GradeBand {
    value
        .as_number()
        .map(GradeBand::from_score)
        .unwrap_or(GradeBand::None)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRates {
    pub valid_count: usize,
    pub pass_count: usize,
    pub excellence_count: usize,
    /// Whole percent.
    pub pass_rate: u32,
    /// Whole percent.
    pub excellence_rate: u32,
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (100.0 * part as f64 / whole as f64).round() as u32
}

pub fn rates<'a, I>(values: I) -> GradeRates
where
    I: IntoIterator<Item = &'a CellValue>,
{
    let mut valid_count = 0;
    let mut pass_count = 0;
    let mut excellence_count = 0;
    for score in values.into_iter().filter_map(CellValue::as_number) {
        valid_count += 1;
        if score >= PASS_THRESHOLD {
            pass_count += 1;
        }
        if score >= EXCELLENT_THRESHOLD {
            excellence_count += 1;
        }
    }
    GradeRates {
        valid_count,
        pass_count,
        excellence_count,
        pass_rate: percent(pass_count, valid_count),
        excellence_rate: percent(excellence_count, valid_count),
    }
}

/// Count of values per band, in [`GradeBand::ALL`] order.
pub fn distribution<'a, I>(values: I) -> Vec<(GradeBand, usize)>
where
    I: IntoIterator<Item = &'a CellValue>,
{
    let mut counts = [0_usize; 6];
    for v in values {
        let band = classify(v);
        if let Some(i) = GradeBand::ALL.iter().position(|b| *b == band) {
            counts[i] += 1;
        }
    }
    GradeBand::ALL.iter().copied().zip(counts).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_boundaries() {
        let cases = [
            (100.0, GradeBand::Excellent),
            (90.0, GradeBand::Excellent),
            (89.99, GradeBand::VeryGood),
            (80.0, GradeBand::VeryGood),
            (70.0, GradeBand::Good),
            (69.5, GradeBand::Fair),
            (55.0, GradeBand::Fair),
            (54.9, GradeBand::Weak),
            (0.0, GradeBand::Weak),
            (-5.0, GradeBand::Weak),
        ];
        for (score, band) in cases {
            assert_eq!(classify(&CellValue::Number(score)), band, "{score}");
        }
    }

    #[test]
    fn empty_and_text_are_none() {
        assert_eq!(classify(&CellValue::Empty), GradeBand::None);
        assert_eq!(classify(&CellValue::from("absent")), GradeBand::None);
        assert_eq!(classify(&CellValue::from("91")), GradeBand::Excellent);
    }

    #[test]
    fn text_grades_leave_the_denominator() {
        let grades: Vec<CellValue> = vec![
            CellValue::Number(95.0),
            CellValue::Number(88.0),
            CellValue::Number(60.0),
            CellValue::Number(40.0),
            CellValue::from("absent"),
        ];
        let r = rates(&grades);
        assert_eq!(r.valid_count, 4);
        assert_eq!(r.pass_rate, 75);
        assert_eq!(r.excellence_rate, 25);
    }

    #[test]
    fn no_valid_grades_means_zero_percent() {
        let grades = vec![CellValue::Empty, CellValue::from("-")];
        assert_eq!(rates(&grades), GradeRates::default());
    }

    #[test]
    fn distribution_covers_every_band() {
        let grades = vec![
            CellValue::Number(91.0),
            CellValue::Number(93.0),
            CellValue::Number(50.0),
            CellValue::Empty,
        ];
        let d = distribution(&grades);
        assert_eq!(d.len(), 6);
        assert_eq!(d[0], (GradeBand::Excellent, 2));
        assert_eq!(d[4], (GradeBand::Weak, 1));
        assert_eq!(d[5], (GradeBand::None, 1));
    }
}
