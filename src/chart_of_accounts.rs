use crate::control::Anchor;
use crate::schema::StatementType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Structural section of a statement. Every mapped line lands in exactly one.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    CurrentAssets,
    NonCurrentAssets,
    CurrentLiabilities,
    NonCurrentLiabilities,
    StockholdersEquity,
    OperatingItems,
    NonOperatingItems,
    PerShareItems,
    OperatingActivities,
    InvestingActivities,
    FinancingActivities,
    Supplemental,
    ComprehensiveIncomeItems,
    EquityChanges,
}

impl Section {
    pub fn for_statement(statement: StatementType) -> &'static [Section] {
        match statement {
            StatementType::BalanceSheet => &[
                Section::CurrentAssets,
                Section::NonCurrentAssets,
                Section::CurrentLiabilities,
                Section::NonCurrentLiabilities,
                Section::StockholdersEquity,
            ],
            StatementType::IncomeStatement => &[
                Section::OperatingItems,
                Section::NonOperatingItems,
                Section::PerShareItems,
            ],
            StatementType::CashFlow => &[
                Section::OperatingActivities,
                Section::InvestingActivities,
                Section::FinancingActivities,
                Section::Supplemental,
            ],
            StatementType::ComprehensiveIncome => &[Section::ComprehensiveIncomeItems],
            StatementType::Equity => &[Section::EquityChanges],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Section::CurrentAssets => "current_assets",
            Section::NonCurrentAssets => "non_current_assets",
            Section::CurrentLiabilities => "current_liabilities",
            Section::NonCurrentLiabilities => "non_current_liabilities",
            Section::StockholdersEquity => "stockholders_equity",
            Section::OperatingItems => "operating_items",
            Section::NonOperatingItems => "non_operating_items",
            Section::PerShareItems => "per_share_items",
            Section::OperatingActivities => "operating_activities",
            Section::InvestingActivities => "investing_activities",
            Section::FinancingActivities => "financing_activities",
            Section::Supplemental => "supplemental",
            Section::ComprehensiveIncomeItems => "comprehensive_income_items",
            Section::EquityChanges => "equity_changes",
        }
    }

    /// Generic bucket for lines no rule claims, `other_<section>`.
    pub fn bucket(&self) -> String {
        format!("other_{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Anchor,
    Line,
    Bucket,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FieldEntry {
    pub name: String,
    pub section: Section,
    pub kind: FieldKind,
}

const BALANCE_SHEET_FIELDS: &[(&str, Section)] = &[
    ("cash_and_cash_equivalents", Section::CurrentAssets),
    ("cash_and_short_term_investments", Section::CurrentAssets),
    ("cash_cash_equivalent_and_restricted_cash", Section::CurrentAssets),
    ("short_term_investments", Section::CurrentAssets),
    ("account_receivables_net", Section::CurrentAssets),
    ("other_receivables", Section::CurrentAssets),
    ("inventory", Section::CurrentAssets),
    ("prepaids", Section::CurrentAssets),
    ("property_plant_equipment_net", Section::NonCurrentAssets),
    ("finance_lease_right_of_use_assets", Section::NonCurrentAssets),
    ("operating_lease_right_of_use_assets", Section::NonCurrentAssets),
    ("lease_assets", Section::NonCurrentAssets),
    ("long_term_investments", Section::NonCurrentAssets),
    ("goodwill", Section::NonCurrentAssets),
    ("intangible_assets", Section::NonCurrentAssets),
    ("goodwill_and_intangible_assets", Section::NonCurrentAssets),
    ("deferred_tax_assets", Section::NonCurrentAssets),
    ("due_from_bank", Section::CurrentAssets),
    ("deposits_with_bank", Section::CurrentAssets),
    ("resale_agreement", Section::CurrentAssets),
    ("trading_assets_at_fair_value", Section::CurrentAssets),
    ("available_for_sale_securities", Section::NonCurrentAssets),
    ("held_to_maturity_securities", Section::NonCurrentAssets),
    ("loans_held_for_sale", Section::CurrentAssets),
    ("loans_net_of_allowance", Section::NonCurrentAssets),
    ("accrued_receivables", Section::CurrentAssets),
    ("premises_and_equipment", Section::NonCurrentAssets),
    ("owned_life_insurance", Section::NonCurrentAssets),
    ("federal_bank_stock", Section::NonCurrentAssets),
    ("real_estate_assets_net", Section::NonCurrentAssets),
    ("foreclosed_assets", Section::NonCurrentAssets),
    ("short_term_debt", Section::CurrentLiabilities),
    ("account_payables", Section::CurrentLiabilities),
    ("accrued_payroll", Section::CurrentLiabilities),
    ("accrued_expenses", Section::CurrentLiabilities),
    ("deferred_revenue", Section::CurrentLiabilities),
    ("tax_payables", Section::CurrentLiabilities),
    ("dividends_payable", Section::CurrentLiabilities),
    ("finance_lease_obligations_current", Section::CurrentLiabilities),
    ("operating_lease_obligations_current", Section::CurrentLiabilities),
    ("lease_obligation_current", Section::CurrentLiabilities),
    ("customer_deposits", Section::CurrentLiabilities),
    ("federal_funds_purchased_and_repurchase_agreements", Section::CurrentLiabilities),
    ("short_term_borrowings", Section::CurrentLiabilities),
    ("long_term_debt", Section::NonCurrentLiabilities),
    ("pension_and_postretirement_benefits", Section::NonCurrentLiabilities),
    ("deferred_revenue_non_current", Section::NonCurrentLiabilities),
    ("deferred_tax_liabilities_non_current", Section::NonCurrentLiabilities),
    ("tax_payables_non_current", Section::NonCurrentLiabilities),
    ("finance_lease_obligations_non_current", Section::NonCurrentLiabilities),
    ("operating_lease_obligations_non_current", Section::NonCurrentLiabilities),
    ("lease_obligation_non_current", Section::NonCurrentLiabilities),
    ("commitments_and_contingencies", Section::NonCurrentLiabilities),
    ("federal_home_loan_bank_advances", Section::NonCurrentLiabilities),
    ("subordinated_debt", Section::NonCurrentLiabilities),
    ("common_stock", Section::StockholdersEquity),
    ("preferred_stock", Section::StockholdersEquity),
    ("additional_paid_in_capital", Section::StockholdersEquity),
    ("treasury_stock", Section::StockholdersEquity),
    ("retained_earnings", Section::StockholdersEquity),
    ("accumulated_other_comprehensive_income_loss", Section::StockholdersEquity),
    ("minority_interest", Section::StockholdersEquity),
    ("redeemable_non_controlling_interests", Section::StockholdersEquity),
    ("total_equity", Section::StockholdersEquity),
];

const INCOME_STATEMENT_FIELDS: &[(&str, Section)] = &[
    ("cost_of_revenue", Section::OperatingItems),
    ("gross_profit", Section::OperatingItems),
    ("research_and_development_expenses", Section::OperatingItems),
    ("sales_and_marketing_expenses", Section::OperatingItems),
    ("general_and_administrative_expenses", Section::OperatingItems),
    ("selling_general_and_administrative_expenses", Section::OperatingItems),
    ("depreciation_and_amortization", Section::OperatingItems),
    ("other_expenses", Section::OperatingItems),
    ("operating_expenses", Section::OperatingItems),
    ("cost_and_expenses", Section::OperatingItems),
    ("interest_income", Section::NonOperatingItems),
    ("interest_expense", Section::NonOperatingItems),
    ("net_interest_income", Section::NonOperatingItems),
    ("provision_for_credit_losses", Section::NonOperatingItems),
    ("noninterest_income", Section::NonOperatingItems),
    ("noninterest_expense", Section::NonOperatingItems),
    ("total_other_income_expenses_net", Section::NonOperatingItems),
    ("non_operating_income", Section::NonOperatingItems),
    ("income_before_tax", Section::NonOperatingItems),
    ("net_income_from_continuing_operations", Section::NonOperatingItems),
    ("net_income_from_discontinued_operations", Section::NonOperatingItems),
    ("net_income_attributed_to_non_controlling_interests", Section::PerShareItems),
    ("net_income_attributable_to_controlling_interests", Section::PerShareItems),
];

const CASH_FLOW_FIELDS: &[(&str, Section)] = &[
    ("depreciation_and_amortization", Section::OperatingActivities),
    ("depreciation", Section::OperatingActivities),
    ("amortization", Section::OperatingActivities),
    ("stock_based_compensation", Section::OperatingActivities),
    ("deferred_income_tax", Section::OperatingActivities),
    ("impairments", Section::OperatingActivities),
    ("pension_and_postretirement", Section::OperatingActivities),
    ("non_operating_expense_income", Section::OperatingActivities),
    ("investment_gains_losses", Section::OperatingActivities),
    ("other_adjustments", Section::OperatingActivities),
    ("accounts_receivables", Section::OperatingActivities),
    ("vendor_receivables", Section::OperatingActivities),
    ("inventory", Section::OperatingActivities),
    ("prepaids", Section::OperatingActivities),
    ("accounts_payables", Section::OperatingActivities),
    ("accrued_expenses", Section::OperatingActivities),
    ("unearned_revenue", Section::OperatingActivities),
    ("income_taxes_payable", Section::OperatingActivities),
    ("income_taxes", Section::OperatingActivities),
    ("other_assets", Section::OperatingActivities),
    ("other_liabilities", Section::OperatingActivities),
    ("change_in_other_working_capital", Section::OperatingActivities),
    ("investments_in_property_plant_and_equipment", Section::InvestingActivities),
    ("proceeds_from_sales_of_ppe", Section::InvestingActivities),
    ("acquisitions_of_business_net", Section::InvestingActivities),
    ("proceeds_from_divestiture", Section::InvestingActivities),
    ("purchases_of_investments", Section::InvestingActivities),
    ("sales_maturities_of_investments", Section::InvestingActivities),
    ("other_acquisitions_and_investments", Section::InvestingActivities),
    ("short_term_debt_issuance", Section::FinancingActivities),
    ("short_term_debt_repayment", Section::FinancingActivities),
    ("change_in_short_term_debt_net", Section::FinancingActivities),
    ("long_term_net_debt_issuance", Section::FinancingActivities),
    ("long_term_net_debt_repayment", Section::FinancingActivities),
    ("change_in_long_term_debt_net", Section::FinancingActivities),
    ("term_debt_issuance", Section::FinancingActivities),
    ("term_debt_repayment", Section::FinancingActivities),
    ("change_in_term_debt", Section::FinancingActivities),
    ("commercial_paper_net", Section::FinancingActivities),
    ("finance_lease_repayment", Section::FinancingActivities),
    ("financing_obligations_repayment", Section::FinancingActivities),
    ("net_stock_issuance", Section::FinancingActivities),
    ("net_common_stock_issuance", Section::FinancingActivities),
    ("common_stock_issuance", Section::FinancingActivities),
    ("common_stock_repurchased", Section::FinancingActivities),
    ("taxes_on_share_settlement", Section::FinancingActivities),
    ("net_preferred_stock_issuance", Section::FinancingActivities),
    ("preferred_stock_issuance", Section::FinancingActivities),
    ("proceeds_from_issuance_of_treasury_stock", Section::FinancingActivities),
    ("dividends_paid", Section::FinancingActivities),
    ("common_dividends_paid", Section::FinancingActivities),
    ("preferred_dividends_paid", Section::FinancingActivities),
    ("issuance_costs", Section::FinancingActivities),
    ("effect_of_foreign_exchange_rate_changes_on_cash", Section::Supplemental),
    ("net_change_in_cash", Section::Supplemental),
    ("income_taxes_paid", Section::Supplemental),
    ("interest_paid", Section::Supplemental),
];

const COMPREHENSIVE_INCOME_FIELDS: &[(&str, Section)] = &[
    ("net_income", Section::ComprehensiveIncomeItems),
    ("foreign_currency_translation_adjustment", Section::ComprehensiveIncomeItems),
    ("unrealized_gains_losses_on_securities", Section::ComprehensiveIncomeItems),
    ("cash_flow_hedges", Section::ComprehensiveIncomeItems),
    ("pension_adjustments", Section::ComprehensiveIncomeItems),
    ("other_comprehensive_income_tax", Section::ComprehensiveIncomeItems),
    ("total_other_comprehensive_income", Section::ComprehensiveIncomeItems),
    (
        "comprehensive_income_attributable_to_non_controlling_interests",
        Section::ComprehensiveIncomeItems,
    ),
    ("comprehensive_income", Section::ComprehensiveIncomeItems),
];

const EQUITY_FIELDS: &[(&str, Section)] = &[
    ("total_equity_beginning_of_period", Section::EquityChanges),
    ("net_income", Section::EquityChanges),
    ("other_comprehensive_income", Section::EquityChanges),
    ("dividends_declared", Section::EquityChanges),
    ("stock_based_compensation", Section::EquityChanges),
    ("common_stock_issuance", Section::EquityChanges),
    ("common_stock_repurchased", Section::EquityChanges),
    ("total_equity_end_of_period", Section::EquityChanges),
];

/// Catalog of the standardized fields of one statement: anchors first,
/// then line fields, then one generic bucket per section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ChartOfAccounts {
    pub statement: StatementType,
    pub fields: Vec<FieldEntry>,
}

impl ChartOfAccounts {
    pub fn for_statement(statement: StatementType) -> Self {
        let mut fields: Vec<FieldEntry> = Anchor::for_statement(statement)
            .iter()
            .map(|anchor| FieldEntry {
                name: anchor.name().to_string(),
                section: anchor.section(statement),
                kind: FieldKind::Anchor,
            })
            .collect();

        let lines = match statement {
            StatementType::BalanceSheet => BALANCE_SHEET_FIELDS,
            StatementType::IncomeStatement => INCOME_STATEMENT_FIELDS,
            StatementType::CashFlow => CASH_FLOW_FIELDS,
            StatementType::ComprehensiveIncome => COMPREHENSIVE_INCOME_FIELDS,
            StatementType::Equity => EQUITY_FIELDS,
        };
        for (name, section) in lines {
            if fields.iter().any(|f| f.name == *name) {
                continue;
            }
            fields.push(FieldEntry {
                name: name.to_string(),
                section: *section,
                kind: FieldKind::Line,
            });
        }

        for section in Section::for_statement(statement) {
            fields.push(FieldEntry {
                name: section.bucket(),
                section: *section,
                kind: FieldKind::Bucket,
            });
        }

        Self { statement, fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn section_of(&self, name: &str) -> Option<Section> {
        self.get(name).map(|f| f.section)
    }

    /// Position of a field in the catalog, used to order standardized output.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn total_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("# Standardized fields - {}\n\n", self.statement));

        for section in Section::for_statement(self.statement) {
            output.push_str(&format!("## {}\n\n", section.name()));
            for field in self.fields.iter().filter(|f| f.section == *section) {
                let marker = match field.kind {
                    FieldKind::Anchor => " **[ANCHOR]**",
                    FieldKind::Bucket => " _[BUCKET]_",
                    FieldKind::Line => "",
                };
                output.push_str(&format!("- {}{}\n", field.name, marker));
            }
            output.push('\n');
        }

        output
    }
}
