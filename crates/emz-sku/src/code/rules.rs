use serde::{Deserialize, Serialize};

/// Length of every model and category code.
pub const MODEL_CODE_LEN: usize = 3;

/// A single row of a code table.
///
/// The rule matches when any of its `keywords` is a substring of the
/// lower-cased input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeRule {
    pub code: String,
    pub keywords: Vec<String>,
}

impl CodeRule {
    pub fn new(code: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            code: code.into(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    #[inline]
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// An ordered list of [`CodeRule`]s. The first matching rule wins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable(Vec<CodeRule>);

impl RuleTable {
    pub const fn new(rules: Vec<CodeRule>) -> Self {
        Self(rules)
    }

    /// Returns the code of the first rule matching `lowered`.
    ///
    /// `lowered` must already be lower-cased.
    pub fn lookup(&self, lowered: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|rule| rule.matches(lowered))
            .map(|rule| rule.code.as_str())
    }

    pub fn rules(&self) -> &[CodeRule] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Puts `self` in front of `fallback`, so `self` takes precedence.
    fn chain(mut self, fallback: Self) -> Self {
        self.0.extend(fallback.0);
        self
    }

    fn from_static(rows: &[(&str, &[&str])]) -> Self {
        Self(
            rows.iter()
                .map(|(code, keywords)| CodeRule::new(*code, keywords))
                .collect(),
        )
    }

    fn normalise(&mut self) {
        for rule in &mut self.0 {
            rule.code = rule.code.trim().to_string();
            rule.keywords = rule
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .collect();
        }
    }

    fn validate(&self, table: Table) -> Result<(), RuleError> {
        for rule in &self.0 {
            let code = &rule.code;
            let well_formed = !code.is_empty()
                && code
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
            if !well_formed {
                return Err(RuleError::InvalidCode {
                    table,
                    code: code.clone(),
                    reason: "codes must be upper-case ASCII letters or digits",
                });
            }
            if table != Table::Brands && code.len() != MODEL_CODE_LEN {
                return Err(RuleError::InvalidCode {
                    table,
                    code: code.clone(),
                    reason: "model and category codes must be exactly 3 characters",
                });
            }
            if rule.keywords.is_empty() || rule.keywords.iter().any(String::is_empty) {
                return Err(RuleError::EmptyKeyword {
                    table,
                    code: code.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Which table a rule belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    Brands,
    Models,
    Categories,
}

impl core::fmt::Display for Table {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Brands => "brands",
            Self::Models => "models",
            Self::Categories => "categories",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("rules file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{table}: invalid code `{code}`: {reason}")]
    InvalidCode {
        table: Table,
        code: String,
        reason: &'static str,
    },

    #[error("{table}: rule `{code}` has an empty keyword list or an empty keyword")]
    EmptyKeyword { table: Table, code: String },
}

/// The complete set of code tables.
///
/// Model derivation checks `models` (brand-model families such as *speedy*
/// or *neverfull*) before `categories` (generic kinds such as *tote* or
/// *wallet*), so "Zippy Wallet" is `ZPY`, not `WLT`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSet {
    /// When loading from a file, check these rules first and then fall back
    /// to the built-in tables.
    #[serde(default)]
    pub inherit: bool,
    #[serde(default)]
    pub brands: RuleTable,
    #[serde(default)]
    pub models: RuleTable,
    #[serde(default)]
    pub categories: RuleTable,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleSet {
    /// The compiled-in tables.
    pub fn builtin() -> Self {
        Self {
            inherit: false,
            brands: RuleTable::from_static(BRANDS),
            models: RuleTable::from_static(MODEL_FAMILIES),
            categories: RuleTable::from_static(CATEGORIES),
        }
    }

    /// Parses a JSON rules document.
    ///
    /// Codes are trimmed and keywords lower-cased. With `"inherit": true` the
    /// parsed tables are placed ahead of the built-in ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or any rule is
    /// malformed.
    pub fn from_json(text: &str) -> Result<Self, RuleError> {
        let mut rules: Self = serde_json::from_str(text)?;
        rules.brands.normalise();
        rules.models.normalise();
        rules.categories.normalise();
        rules.validate()?;

        if rules.inherit {
            let builtin = Self::builtin();
            rules = Self {
                inherit: false,
                brands: rules.brands.chain(builtin.brands),
                models: rules.models.chain(builtin.models),
                categories: rules.categories.chain(builtin.categories),
            };
        }
        Ok(rules)
    }

    /// # Errors
    ///
    /// Returns the first malformed rule found.
    pub fn validate(&self) -> Result<(), RuleError> {
        self.brands.validate(Table::Brands)?;
        self.models.validate(Table::Models)?;
        self.categories.validate(Table::Categories)
    }
}

// Order matters: "calvin klein" contains "lv" and must be checked first.
const BRANDS: &[(&str, &[&str])] = &[
    ("CK", &["calvin klein"]),
    // Bare "lv" also matches inside words such as "silver" or "velvet".
    ("LV", &["louis", "lv", "vuitton"]),
    ("CH", &["chanel"]),
    ("HR", &["herm"]),
    ("GC", &["gucci"]),
    ("PR", &["prada"]),
    ("MM", &["miu miu", "miumiu"]),
    ("DR", &["dior"]),
    ("FD", &["fendi"]),
    ("CL", &["celine", "céline"]),
    ("BL", &["balenciaga"]),
    ("BV", &["bottega"]),
    ("SL", &["saint laurent", "ysl", "yves"]),
    ("GY", &["goyard"]),
    ("GV", &["givenchy"]),
    ("LW", &["loewe"]),
    ("BB", &["burberry"]),
    ("VL", &["valentino"]),
    ("VS", &["versace"]),
    ("CT", &["cartier"]),
    ("TF", &["tiffany"]),
    ("CO", &["coach"]),
    ("MK", &["michael kors", "kors"]),
];

const MODEL_FAMILIES: &[(&str, &[&str])] = &[
    ("MPC", &["multi pochette", "multi-pochette"]),
    ("NVF", &["neverfull"]),
    ("SPD", &["speedy"]),
    ("ZPY", &["zippy"]),
    ("ALM", &["alma"]),
    ("KPL", &["keepall"]),
    ("PCH", &["pochette"]),
    ("FAV", &["favorite"]),
    ("ART", &["artsy"]),
    ("MTG", &["montaigne"]),
    ("OTG", &["onthego", "on the go"]),
    ("CPC", &["capucines"]),
    ("TWS", &["twist"]),
    ("NOE", &["noe", "noé"]),
    ("WOC", &["wallet on chain", "woc"]),
    ("FLP", &["classic flap", "flap"]),
    ("BOY", &["boy"]),
    ("RSS", &["reissue", "2.55"]),
    ("BRK", &["birkin"]),
    ("KLY", &["kelly"]),
    ("MRM", &["marmont"]),
    ("DNS", &["dionysus"]),
    ("JCK", &["jackie"]),
    ("LDY", &["lady dior"]),
    ("SDL", &["saddle"]),
    ("BGT", &["baguette"]),
    ("PKB", &["peekaboo"]),
    ("PZL", &["puzzle"]),
    ("CTY", &["city"]),
    ("LLU", &["loulou"]),
];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("CRB", &["crossbody", "cross body", "messenger"]),
    ("SHB", &["shoulder"]),
    ("TOT", &["tote", "shopper"]),
    ("BPK", &["backpack"]),
    ("CLT", &["clutch"]),
    ("CRD", &["card holder", "cardholder", "card case"]),
    ("WLT", &["wallet"]),
    ("POU", &["pouch"]),
    ("BLT", &["belt"]),
    ("SCF", &["scarf", "shawl"]),
    ("SNG", &["sunglasses"]),
    ("WTC", &["watch"]),
    ("BRC", &["bracelet", "bangle"]),
    ("NCK", &["necklace", "pendant"]),
    ("ERG", &["earring"]),
    ("SNK", &["sneaker", "trainer"]),
    ("SHO", &["shoe", "loafer", "pump"]),
    ("BAG", &["handbag", "bag"]),
];
