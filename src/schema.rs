// ABOUTME: Static description of the transactions table used in generation prompts
// ABOUTME: Columns, closed enumerations, and Cyrillic to Latin city/bank literal tables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Schema Descriptor
//!
//! The analytics database holds a single `transactions` table whose text
//! columns are stored in Latin script. Users ask in Russian or Kazakh, so the
//! descriptor carries the transliteration tables the model needs to turn
//! "в Алмате" into `merchant_city = 'Almaty'`.
//!
//! The descriptor is built once and shared read-only through [`schema`].

use std::fmt::Write as _;
use std::sync::LazyLock;

/// Table every generated query runs against
pub const TABLE_NAME: &str = "transactions";

/// Semantic type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Auto-increment primary key
    Serial,
    /// Integer identifier or code
    Integer,
    /// Free or enumerated text
    Text,
    /// `NUMERIC(15, 2)` amount
    Amount,
    /// Point in time
    Timestamp,
}

/// One column of the `transactions` table
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    /// Column name (lowercase)
    pub name: &'static str,
    /// SQL type as declared
    pub sql_type: &'static str,
    /// Semantic type
    pub kind: ColumnType,
    /// Short meaning for the model
    pub description: &'static str,
    /// Closed set of values, when the column has one
    pub enumeration: Option<&'static [&'static str]>,
}

/// Cyrillic spellings that map to one Latin literal
#[derive(Debug, Clone)]
pub struct Transliteration {
    /// Value stored in the database
    pub latin: &'static str,
    /// Lowercase Cyrillic forms (including inflections) users type
    pub aliases: &'static [&'static str],
}

/// Immutable description of the queryable schema
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    /// Columns in declaration order
    pub columns: Vec<ColumnDescriptor>,
    /// City names
    pub cities: Vec<Transliteration>,
    /// Issuer bank names
    pub banks: Vec<Transliteration>,
}

const MCC_CATEGORIES: &[&str] = &[
    "Clothing & Apparel",
    "Dining & Restaurants",
    "Electronics & Software",
    "Fuel & Service Stations",
    "General Retail & Department",
    "Grocery & Food Markets",
    "Hobby, Books, Sporting Goods",
    "Home Furnishings & Supplies",
    "Pharmacies & Health",
    "Services (Other)",
    "Travel & Transportation",
    "Unknown",
    "Utilities & Bill Payments",
];

const TRANSACTION_TYPES: &[&str] = &[
    "ATM_WITHDRAWAL",
    "BILL_PAYMENT",
    "ECOM",
    "P2P_IN",
    "P2P_OUT",
    "POS",
    "SALARY",
];

const CURRENCIES: &[&str] = &[
    "AMD", "BYN", "CNY", "EUR", "GEL", "KGS", "KZT", "TRY", "USD", "UZS",
];

const ACQUIRER_COUNTRIES: &[&str] = &[
    "ARM", "BLR", "CHN", "GEO", "ITA", "KAZ", "KGZ", "TUR", "USA", "UZB",
];

const POS_ENTRY_MODES: &[&str] = &["Contactless", "ECOM", "QR_Code", "Swipe", "Chip"];

const WALLET_TYPES: &[&str] = &["Bank's QR", "Samsung Pay", "Google Pay", "Apple Pay"];

const CITIES: &[&str] = &[
    "Almaty",
    "Astana",
    "Shymkent",
    "Karaganda",
    "Aktobe",
    "Taraz",
    "Pavlodar",
    "Oskemen",
];

impl SchemaDescriptor {
    /// Build the descriptor for the `transactions` table
    #[must_use]
    pub fn transactions() -> Self {
        let column = |name, sql_type, kind, description, enumeration| ColumnDescriptor {
            name,
            sql_type,
            kind,
            description,
            enumeration,
        };

        let columns = vec![
            column("id", "SERIAL PRIMARY KEY", ColumnType::Serial, "row id", None),
            column(
                "transaction_id",
                "VARCHAR(255) NOT NULL",
                ColumnType::Text,
                "unique transaction identifier",
                None,
            ),
            column(
                "transaction_timestamp",
                "TIMESTAMP",
                ColumnType::Timestamp,
                "when transaction occurred",
                None,
            ),
            column("card_id", "INTEGER", ColumnType::Integer, "card identifier", None),
            column(
                "expiry_date",
                "VARCHAR(10)",
                ColumnType::Text,
                "card expiry date, format MM/YY",
                None,
            ),
            column(
                "issuer_bank_name",
                "VARCHAR(255)",
                ColumnType::Text,
                "bank that issued the card",
                None,
            ),
            column("merchant_id", "INTEGER", ColumnType::Integer, "merchant identifier", None),
            column(
                "merchant_mcc",
                "INTEGER",
                ColumnType::Integer,
                "Merchant Category Code",
                None,
            ),
            column(
                "mcc_category",
                "VARCHAR(255)",
                ColumnType::Text,
                "category name",
                Some(MCC_CATEGORIES),
            ),
            column(
                "merchant_city",
                "VARCHAR(255)",
                ColumnType::Text,
                "city where merchant is located",
                Some(CITIES),
            ),
            column(
                "transaction_type",
                "VARCHAR(50)",
                ColumnType::Text,
                "kind of transaction",
                Some(TRANSACTION_TYPES),
            ),
            column(
                "transaction_amount_kzt",
                "NUMERIC(15, 2)",
                ColumnType::Amount,
                "amount in KZT",
                None,
            ),
            column(
                "original_amount",
                "NUMERIC(15, 2)",
                ColumnType::Amount,
                "original amount if currency conversion occurred, nullable",
                None,
            ),
            column(
                "transaction_currency",
                "VARCHAR(3)",
                ColumnType::Text,
                "currency code",
                Some(CURRENCIES),
            ),
            column(
                "acquirer_country_iso",
                "VARCHAR(3)",
                ColumnType::Text,
                "ISO country code",
                Some(ACQUIRER_COUNTRIES),
            ),
            column(
                "pos_entry_mode",
                "VARCHAR(50)",
                ColumnType::Text,
                "how the card was presented, or NULL",
                Some(POS_ENTRY_MODES),
            ),
            column(
                "wallet_type",
                "VARCHAR(50)",
                ColumnType::Text,
                "digital wallet, or NULL",
                Some(WALLET_TYPES),
            ),
        ];

        let cities = vec![
            Transliteration {
                latin: "Astana",
                aliases: &["астана", "астану", "астане", "астаны"],
            },
            Transliteration {
                latin: "Almaty",
                aliases: &["алматы", "алмату", "алмате", "алматыдағы"],
            },
            Transliteration {
                latin: "Shymkent",
                aliases: &["шымкент", "шымкента", "шымкенте"],
            },
            Transliteration {
                latin: "Karaganda",
                aliases: &["караганда", "караганду", "караганде", "караганды", "қарағанды"],
            },
            Transliteration {
                latin: "Aktobe",
                aliases: &["актобе", "ақтөбе"],
            },
            Transliteration {
                latin: "Taraz",
                aliases: &["тараз", "таразе"],
            },
            Transliteration {
                latin: "Pavlodar",
                aliases: &["павлодар", "павлодаре"],
            },
            Transliteration {
                latin: "Oskemen",
                aliases: &["усть-каменогорск", "усть-каменогорске", "оскемен", "өскемен"],
            },
        ];

        let banks = vec![
            Transliteration {
                latin: "Halyk Bank",
                aliases: &["халык банк", "халык", "халық"],
            },
            Transliteration {
                latin: "Kaspi Bank",
                aliases: &["каспи банк", "каспи"],
            },
            Transliteration {
                latin: "ForteBank",
                aliases: &["форте банк", "форте"],
            },
            Transliteration {
                latin: "Jusan Bank",
                aliases: &["жусан банк", "жусан"],
            },
            Transliteration {
                latin: "Eurasian Bank",
                aliases: &["евразийский банк", "евразийский"],
            },
            Transliteration {
                latin: "Bank CenterCredit",
                aliases: &["банк центркредит", "центркредит"],
            },
        ];

        Self {
            columns,
            cities,
            banks,
        }
    }

    /// Render the schema section of the generation prompt
    #[must_use]
    pub fn render_prompt(&self) -> String {
        let mut out = String::with_capacity(4096);
        out.push_str("DATABASE SCHEMA:\n\n");
        let _ = writeln!(out, "Table: {TABLE_NAME}");

        let last = self.columns.len().saturating_sub(1);
        for (idx, column) in self.columns.iter().enumerate() {
            let branch = if idx == last { "└─" } else { "├─" };
            let _ = write!(
                out,
                "{branch} {}: {} ({}",
                column.name, column.sql_type, column.description
            );
            if let Some(values) = column.enumeration {
                let quoted: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
                let _ = write!(out, ", possible values: {}", quoted.join(", "));
            }
            out.push_str(")\n");
        }

        out.push_str(
            "\nCRITICAL: ALL TEXT DATA IN THE DATABASE IS STORED IN LATIN SCRIPT (ENGLISH).\n\
             Always convert Cyrillic city/bank names to their Latin equivalents in SQL queries.\n",
        );
        render_mapping(&mut out, "CITY NAME MAPPING (Cyrillic -> Latin)", &self.cities);
        render_mapping(&mut out, "BANK NAME MAPPING (Cyrillic -> Latin)", &self.banks);
        out
    }
}

fn render_mapping(out: &mut String, title: &str, table: &[Transliteration]) {
    let _ = write!(out, "\n{title}:\n");
    for entry in table {
        let _ = writeln!(out, "- {} -> '{}'", entry.aliases.join(", "), entry.latin);
    }
}

static SCHEMA: LazyLock<SchemaDescriptor> = LazyLock::new(SchemaDescriptor::transactions);

/// Shared descriptor for the `transactions` table
#[must_use]
pub fn schema() -> &'static SchemaDescriptor {
    &SCHEMA
}
