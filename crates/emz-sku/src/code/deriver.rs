use std::sync::LazyLock;

use crate::{MODEL_CODE_LEN, Prefix, RuleSet};

/// Brand code returned when no brand rule matches or the input is empty.
pub const BRAND_FALLBACK: &str = "BR-GEN";

/// Model code returned when no rule matches and nothing alphanumeric is left
/// after cleaning.
pub const MODEL_FALLBACK: &str = "GEN";

const MODEL_PAD: char = 'X';

static BUILTIN: LazyLock<CodeDeriver> = LazyLock::new(CodeDeriver::default);

/// Maps free-text brand and model names to short classification codes.
///
/// Both derivations are pure and total: the same input always yields the same
/// code and every input yields a non-empty code.
///
/// # Example
/// ```
/// use emz_sku::CodeDeriver;
///
/// let deriver = CodeDeriver::default();
/// assert_eq!(deriver.brand_code("Louis Vuitton"), "LV");
/// assert_eq!(deriver.model_code("Neverfull MM"), "NVF");
/// assert_eq!(deriver.model_code("Odeon"), "ODE");
/// ```
#[derive(Clone, Debug, Default)]
pub struct CodeDeriver {
    rules: RuleSet,
}

impl CodeDeriver {
    pub const fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Returns the brand code for `brand`, or [`BRAND_FALLBACK`].
    pub fn brand_code(&self, brand: &str) -> String {
        let lowered = brand.to_lowercase();
        self.rules
            .brands
            .lookup(&lowered)
            .unwrap_or(BRAND_FALLBACK)
            .to_string()
    }

    /// Returns the 3-character model code for `model`.
    ///
    /// Model-family rules are checked before category rules. When neither
    /// matches, the ASCII alphanumerics of the input are upper-cased and
    /// truncated or `X`-padded to 3 characters; an input with none left
    /// yields [`MODEL_FALLBACK`].
    pub fn model_code(&self, model: &str) -> String {
        let lowered = model.to_lowercase();
        if let Some(code) = self
            .rules
            .models
            .lookup(&lowered)
            .or_else(|| self.rules.categories.lookup(&lowered))
        {
            return code.to_string();
        }

        let mut cleaned: String = model
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .take(MODEL_CODE_LEN)
            .collect();

        if cleaned.is_empty() {
            return MODEL_FALLBACK.to_string();
        }
        while cleaned.len() < MODEL_CODE_LEN {
            cleaned.push(MODEL_PAD);
        }
        cleaned
    }

    /// Derives both codes.
    pub fn prefix(&self, brand: &str, model: &str) -> Prefix {
        Prefix::new(self.brand_code(brand), self.model_code(model))
    }
}

/// [`CodeDeriver::brand_code`] with the built-in tables.
pub fn brand_code(brand: &str) -> String {
    BUILTIN.brand_code(brand)
}

/// [`CodeDeriver::model_code`] with the built-in tables.
pub fn model_code(model: &str) -> String {
    BUILTIN.model_code(model)
}

/// [`CodeDeriver::prefix`] with the built-in tables.
pub fn derive_prefix(brand: &str, model: &str) -> Prefix {
    BUILTIN.prefix(brand, model)
}
