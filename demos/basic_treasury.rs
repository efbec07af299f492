//! Basic treasury usage: classify, validate, close a month

use asso_treasury::money::{format_cents, parse_euros};
use asso_treasury::{
    Actor, CategorizationOracle, ClassificationStatus, MemoryStorage, Month, NewCategory,
    NewRule, OracleError, Role, TransactionDraft, Treasury,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

/// Stand-in for a hosted model: files train tickets under "Transport"
struct KeywordOracle;

#[async_trait]
impl CategorizationOracle for KeywordOracle {
    async fn suggest(
        &self,
        description: &str,
        _amount: i64,
        candidates: &[String],
    ) -> Result<Option<String>, OracleError> {
        let label = description
            .to_lowercase()
            .contains("sncf")
            .then(|| "Transport".to_string());
        Ok(label.filter(|l| candidates.contains(l)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧾 Association Treasury - Basic Example\n");

    let treasury = Treasury::new(MemoryStorage::new(), KeywordOracle);
    let organization_id = Uuid::new_v4();
    let treasurer = Actor::new(Uuid::new_v4(), organization_id, Role::Treasurer);
    let member = Actor::new(Uuid::new_v4(), organization_id, Role::Member);

    // 1. Categories and a keyword rule
    println!("📊 Setting up categories...");
    let dues = treasury
        .create_category(&treasurer, NewCategory::named("Cotisations"))
        .await?;
    let transport = treasury
        .create_category(&treasurer, NewCategory::named("Transport"))
        .await?;
    treasury
        .create_rule(
            &treasurer,
            NewRule {
                pattern: "cotisation".to_string(),
                category_id: dues.id,
                priority: 10,
            },
        )
        .await?;
    println!("  ✓ {} and {}\n", dues.name, transport.name);

    // 2. Record transactions, each classified on the way in
    println!("💰 Recording transactions...");
    let date = |d| NaiveDate::from_ymd_opt(2024, 2, d).ok_or("invalid date");
    let drafts = [
        TransactionDraft::builder("Cotisation Léa", date(3)?)
            .euros(parse_euros("20")?)
            .income()
            .build()?,
        TransactionDraft::builder("Billets SNCF congrès", date(12)?)
            .euros(parse_euros("84,50")?)
            .expense()
            .build()?,
    ];

    let mut suggested = Vec::new();
    for draft in drafts {
        let txn = treasury.record_transaction(&member, draft).await?;
        println!(
            "  ✓ {:<22} {:>9} € via {} ({})",
            txn.description,
            format_cents(txn.signed_amount()),
            txn.classification_method.as_str(),
            txn.classification_status.as_str(),
        );
        if txn.classification_status == ClassificationStatus::AiSuggested {
            suggested.push(txn.id);
        }
    }
    println!();

    // 3. The treasurer confirms the oracle's suggestions
    println!("✅ Validating suggestions...");
    let validated = treasury.validate_batch(&treasurer, &suggested).await?;
    println!("  ✓ {validated} transaction(s) validated\n");

    // 4. Declare the opening balance, then close February
    println!("🏦 Closing February...");
    let january = Month::from_ymd(2024, 1)?;
    let february = Month::from_ymd(2024, 2)?;
    treasury
        .create_initial_closure(&treasurer, january, &parse_euros("150")?, None)
        .await?;

    let preview = treasury.preview(&treasurer, february).await?;
    println!(
        "  Expected balance: {} €",
        format_cents(preview.computed_balance)
    );

    let outcome = treasury
        .create_closure(
            &treasurer,
            february,
            &parse_euros("85,50")?,
            Some("relevé de février"),
        )
        .await?;
    println!(
        "  Bank balance:     {} €",
        format_cents(outcome.closure.bank_balance)
    );
    if outcome.closure.is_reconciled() {
        println!("  ✓ {february} reconciled");
    } else {
        println!("  ⚠ {february} off by {} €", format_cents(outcome.delta));
    }

    let summary = treasury.ledger_summary(&member).await?;
    println!(
        "\n📈 {} closure(s), {} discrepant",
        summary.closure_count, summary.discrepant_months
    );

    Ok(())
}
