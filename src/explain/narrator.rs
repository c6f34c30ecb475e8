// LedgerLens - GPL-3.0-or-later
// This file is part of LedgerLens.
//
// Copyright (C) 2025 Daniel Freiermuth
//
// LedgerLens is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// LedgerLens is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with LedgerLens.  If not, see <https://www.gnu.org/licenses/>.

//! Business-facing wording for attributed features.

const NOT_REPORTED: &str = "Not reported";

/// Features reported in dollars
const CURRENCY_FEATURES: [&str; 5] = [
    "taxableIncome",
    "salary",
    "revenue",
    "amountTaxable",
    "bubblegumTax",
];

const RATE_FEATURE: &str = "confectionarySalesTaxPercent";

/// Human-readable text for one attributed feature of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narration {
    pub display_name: String,
    pub formatted_value: String,
    /// One sentence placing the value in an audit context
    pub context: String,
}

#[must_use]
pub fn display_name(feature: &str) -> &str {
    match feature {
        "taxableIncome" => "Taxable Income",
        "salary" => "Total Payroll",
        "revenue" => "Total Revenue",
        "amountTaxable" => "Amount Taxable",
        "bubblegumTax" => "Bubblegum Tax",
        "confectionarySalesTaxPercent" => "Sales Tax Rate",
        other => other,
    }
}

/// Format a raw value the way the feature is reported. Zero is always
/// "Not reported" for dollar and rate features since missing fields
/// normalize to zero.
#[must_use]
pub fn format_value(feature: &str, value: f64) -> String {
    if CURRENCY_FEATURES.contains(&feature) {
        if value == 0.0 {
            NOT_REPORTED.to_string()
        } else {
            format!("${}", with_thousands(value))
        }
    } else if feature == RATE_FEATURE {
        if value == 0.0 {
            NOT_REPORTED.to_string()
        } else {
            format!("{value:.1}%")
        }
    } else {
        plain(value)
    }
}

/// Describe one feature given its value and signed attribution. A positive
/// contribution pushes towards "anomaly".
#[must_use]
pub fn narrate(feature: &str, value: f64, contribution: f64) -> Narration {
    let display_name = display_name(feature);
    let lower = display_name.to_lowercase();
    let missing = value == 0.0;

    let context = match (contribution > 0.0, missing) {
        (true, true) => format!("Missing {lower} data raises audit concerns"),
        (true, false) => format!("This {lower} value contributes to anomaly detection"),
        (false, true) => format!("Missing {lower} data is consistent with some companies"),
        (false, false) => format!("This {lower} value appears typical"),
    };

    Narration {
        display_name: display_name.to_string(),
        formatted_value: format_value(feature, value),
        context,
    }
}

/// `1234567.891` -> `1,234,567.89`
fn with_thousands(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let digits: Vec<char> = integer.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{fraction}")
}

/// Whole numbers keep one decimal, e.g. `3.0`
fn plain(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_not_reported() {
        assert_eq!(format_value("salary", 0.0), "Not reported");
        assert_eq!(format_value("confectionarySalesTaxPercent", 0.0), "Not reported");
    }

    #[test]
    fn test_currency_and_rate() {
        assert_eq!(format_value("revenue", 1234.5), "$1,234.50");
        assert_eq!(format_value("taxableIncome", 1_234_567.891), "$1,234,567.89");
        assert_eq!(format_value("bubblegumTax", 12.0), "$12.00");
        assert_eq!(format_value("amountTaxable", -1234.5), "$-1,234.50");
        assert_eq!(format_value("confectionarySalesTaxPercent", 7.5), "7.5%");
    }

    #[test]
    fn test_unknown_feature_formats_plainly() {
        assert_eq!(format_value("employees", 3.0), "3.0");
        assert_eq!(format_value("employees", 2.25), "2.25");
        assert_eq!(display_name("employees"), "employees");
    }

    #[test]
    fn test_four_contexts() {
        let suspicious = narrate("revenue", 1234.5, 0.2);
        assert_eq!(suspicious.display_name, "Total Revenue");
        assert!(suspicious.context.contains("contributes to anomaly detection"));

        let missing = narrate("revenue", 0.0, 0.2);
        assert!(missing.context.contains("raises audit concerns"));
        assert_eq!(missing.context, "Missing total revenue data raises audit concerns");

        assert_eq!(
            narrate("salary", 0.0, -0.1).context,
            "Missing total payroll data is consistent with some companies"
        );
        assert_eq!(
            narrate("salary", 5000.0, 0.0).context,
            "This total payroll value appears typical"
        );
    }
}
