use anyhow::Context;
use clap::Parser;
use privatebtc_vault::{BalanceReport, DepositStatus, VaultConfig, VaultSender};

/// Send signet bitcoin from the configured P2WPKH wallet to the vault
#[derive(Debug, Parser)]
#[command(name = "send-to-vault", version)]
struct Args {
    /// Amount in satoshis (defaults to SEND_AMOUNT_SATS)
    amount_sats: Option<u64>,

    /// Pay this address instead of the vault (withdrawal)
    #[arg(long, value_name = "ADDRESS")]
    to: Option<String>,

    /// Build and sign, print the raw transaction, but do not broadcast
    #[arg(long)]
    dry_run: bool,

    /// Show the sender's UTXOs and whether the amount is affordable, then exit
    #[arg(long, conflicts_with_all = ["to", "dry_run"])]
    balance: bool,

    /// Report how many confirmations a transaction has, then exit
    #[arg(
        long,
        value_name = "TXID",
        conflicts_with_all = ["to", "dry_run", "balance", "detect"]
    )]
    status: Option<bitcoin::Txid>,

    /// Look for a confirmed vault deposit of the amount, then exit
    #[arg(long, conflicts_with_all = ["to", "dry_run", "balance"])]
    detect: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger (set RUST_LOG=debug for verbose output, RUST_LOG=info for normal)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = VaultConfig::from_env().context("Failed to load configuration")?;
    let sender = VaultSender::from_config(config).context("Failed to create indexer client")?;
    let amount = args
        .amount_sats
        .unwrap_or(sender.config().default_amount_sats);

    if let Some(txid) = &args.status {
        let status = sender
            .deposit_status(txid)
            .await
            .context("Failed to fetch transaction status")?;
        print_status(&status);
        return Ok(());
    }

    if args.detect {
        match sender
            .detect_deposit(amount)
            .await
            .context("Failed to scan the vault address")?
        {
            Some(status) => print_status(&status),
            None => println!(
                "No confirmed deposit of {} sats found at {}",
                amount,
                sender.config().vault_address
            ),
        }
        return Ok(());
    }

    if args.balance {
        let report = sender
            .balance(amount)
            .await
            .context("Failed to check balance")?;
        print_balance(&report);
        return Ok(());
    }

    let intent = match &args.to {
        Some(recipient) => sender.withdrawal_intent(recipient, amount)?,
        None => sender.vault_intent(Some(amount))?,
    };

    println!("--- {} TRANSACTION BUILDER ---", sender.config().network.to_string().to_uppercase());
    println!("Sender: {}", sender.config().sender_address);
    println!("To:     {}", intent.destination());
    println!("Amount: {} sats", intent.amount_sats());

    if args.dry_run {
        let built = sender
            .prepare(&intent)
            .await
            .context("Failed to build transaction")?;
        println!("\nTXID: {}", built.txid);
        println!("Fee:  {} sats ({} vB)", built.fee_sats, built.vsize());
        println!("Raw transaction (not broadcast):\n{}", built.raw_hex);
        return Ok(());
    }

    let receipt = sender
        .send(&intent)
        .await
        .context("Failed to send transaction")?;

    println!("\n✅ Transaction successfully broadcast!");
    println!("TXID: {}", receipt.txid);
    println!("Fee:  {} sats", receipt.fee_sats);
    if let Some(change) = receipt.change_sats {
        println!("Change: {} sats", change);
    }
    println!("View: {}", receipt.explorer_url);

    Ok(())
}

fn print_balance(report: &BalanceReport) {
    println!("Checking balance for: {}", report.address);
    println!("Found {} UTXOs:\n", report.utxos.len());

    for utxo in &report.utxos {
        println!("- TXID: {}", utxo.txid);
        println!(
            "  VOUT: {} | VALUE: {} sats | CONFIRMED: {}",
            utxo.vout, utxo.value, utxo.confirmed
        );
    }

    println!("\n========================================");
    println!("Total Spendable Balance: {} sats", report.total_sats);
    println!("Confirmed: {} sats", report.confirmed_sats);
    println!("Fee rate: {} sats/vB", report.fee_rate.sat_per_vbyte);

    match (report.estimated_fee_sats, report.shortfall_sats) {
        (Some(fee), _) => println!(
            "✅ You have enough balance to send {} sats + {} sats fee.",
            report.amount_sats, fee
        ),
        (None, Some(shortfall)) => {
            println!(
                "❌ INSUFFICIENT BALANCE to send {} sats (including estimated fees).",
                report.amount_sats
            );
            println!("   Missing: {} sats.", shortfall);
        }
        (None, None) => {}
    }
}

fn print_status(status: &DepositStatus) {
    println!("TXID: {}", status.txid);
    match status.block_height {
        Some(height) => println!(
            "✅ Confirmed in block {} ({} confirmation(s), tip {})",
            height, status.confirmations, status.tip_height
        ),
        None => println!("⏳ Unconfirmed (tip {})", status.tip_height),
    }
}
