//! Rules for banks and bank holding companies.
//!
//! Depository balance sheets are usually unclassified, so asset and
//! liability rules accept either half of their side. These tables are
//! consulted before the general ones.

use super::rules::{rule, FieldRule, ASSETS, LIABILITIES, ANY};
use crate::schema::StatementType;

pub const BALANCE_SHEET: &[FieldRule] = &[
    rule(
        "cash_and_cash_equivalents",
        ASSETS,
        "[equals to 'cash and cash equivalents' or 'cash and equivalents']",
    ),
    rule(
        "due_from_bank",
        ASSETS,
        "[contains 'due from bank'] or [contains 'due' and contains 'bank']",
    ),
    rule(
        "deposits_with_bank",
        ASSETS,
        "[contains 'deposits with bank' or 'time deposit'] or [contains 'interest' and contains 'deposit']",
    ),
    rule("resale_agreement", ASSETS, "[contains 'resell' or 'resale']"),
    rule(
        "available_for_sale_securities",
        ASSETS,
        "[contains 'available for sale' or 'carried at fair value']",
    ),
    rule(
        "held_to_maturity_securities",
        ASSETS,
        "[contains 'held to maturity'] or [contains 'held for investment' and contains 'securities']",
    ),
    rule(
        "trading_assets_at_fair_value",
        ASSETS,
        "[contains 'trading' or 'equity securit' or 'investment'] and [contains 'fair value' or 'asset']",
    ),
    rule(
        "federal_bank_stock",
        ASSETS,
        "[contains 'federal reserve' or 'federal home loan bank' or 'fhlb' or 'frb' or 'regulatory stock']",
    ),
    rule(
        "loans_held_for_sale",
        ASSETS,
        "[contains 'loan' or 'mortgage' or 'lease'] and [contains 'held for sale']",
    ),
    rule(
        "loans_net_of_allowance",
        ASSETS,
        "[contains 'loan' or 'mortgage'] and [contains 'net' or 'allowance' or 'held for investment']",
    ),
    rule(
        "accrued_receivables",
        ASSETS,
        "[contains 'accrued' or 'receivable' or 'recoverable']",
    ),
    rule(
        "premises_and_equipment",
        ASSETS,
        "[contains 'premise' or 'equipment' or 'fixed asset']",
    ),
    rule("owned_life_insurance", ASSETS, "[contains 'life insurance']"),
    rule(
        "foreclosed_assets",
        ASSETS,
        "[contains 'foreclos' or 'repossess' or 'other real estate owned']",
    ),
    rule(
        "real_estate_assets_net",
        ASSETS,
        "[contains 'real estate' and contains 'net']",
    ),
    rule(
        "customer_deposits",
        LIABILITIES,
        "[contains 'deposit'] and [contains 'customer' or 'liabilit' or 'interest bearing' or 'time' or 'savings' or 'demand'] or [equals to 'deposits' or 'total deposits']",
    ),
    rule(
        "federal_funds_purchased_and_repurchase_agreements",
        LIABILITIES,
        "[contains 'federal funds' or 'repurchase']",
    ),
    rule(
        "federal_home_loan_bank_advances",
        LIABILITIES,
        "[contains 'federal home loan bank' or 'fhlb'] or [contains 'advances' and contains 'borrow']",
    ),
    rule(
        "short_term_borrowings",
        LIABILITIES,
        "[contains 'short term'] and [contains 'borrowing' or 'debt'] or [contains 'other borrowed funds']",
    ),
    rule(
        "subordinated_debt",
        LIABILITIES,
        "[contains 'subordinated' or 'junior' or 'trust preferred']",
    ),
];

pub const INCOME_STATEMENT: &[FieldRule] = &[
    rule(
        "provision_for_credit_losses",
        ANY,
        "[contains 'provision'] and [contains 'credit loss' or 'loan loss' or 'lease loss' or 'losses on loans']",
    ),
    rule(
        "noninterest_expense",
        ANY,
        "[contains 'noninterest' or 'non interest'] and [contains 'expense']",
    ),
    rule(
        "noninterest_income",
        ANY,
        "[contains 'noninterest' or 'non interest'] and [contains 'income' or 'revenue']",
    ),
    rule("net_interest_income", ANY, "[contains 'net interest income']"),
    rule(
        "interest_income",
        ANY,
        "[contains 'interest' and contains 'income'] not [contains 'expense']",
    ),
    rule("interest_expense", ANY, "[contains 'interest' and contains 'expense']"),
];

pub fn depository_rules(statement: StatementType) -> &'static [FieldRule] {
    match statement {
        StatementType::BalanceSheet => BALANCE_SHEET,
        StatementType::IncomeStatement => INCOME_STATEMENT,
        _ => &[],
    }
}
