//! # Escrow Subcommand
//!
//! - `campus escrow split --amount N [--bps B]`: seller share and platform commission.
//! - `campus escrow disclose --status S --name .. --address .. --phone ..`: what the counterparty sees.
//! - `campus escrow transitions`: the escrow state table.

use anyhow::Result;
use campus_core::{Amount, CommissionRate};
use campus_escrow::{disclose_contact, ContactDetails, EscrowConfig, EscrowStatus};
use clap::{Args, Subcommand, ValueEnum};

/// Arguments for `campus escrow`.
#[derive(Args, Debug)]
pub struct EscrowArgs {
    #[command(subcommand)]
    pub command: EscrowCommand,
}

/// Escrow subcommands.
#[derive(Subcommand, Debug)]
pub enum EscrowCommand {
    /// Compute the commission split for an order amount.
    Split {
        /// Order amount in minor units.
        #[arg(long)]
        amount: i64,
        /// Commission in basis points. Defaults to the configured rate.
        #[arg(long)]
        bps: Option<u32>,
    },
    /// Apply the disclosure policy to a contact.
    Disclose {
        #[arg(long, value_enum)]
        status: StatusArg,
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        phone: String,
    },
    /// Print reachable statuses for every escrow status.
    Transitions,
}

/// Escrow status on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Created,
    Held,
    Released,
    Disputed,
    ResolvedBuyer,
    ResolvedSeller,
}

impl From<StatusArg> for EscrowStatus {
    fn from(s: StatusArg) -> Self {
        match s {
            StatusArg::Created => EscrowStatus::Created,
            StatusArg::Held => EscrowStatus::Held,
            StatusArg::Released => EscrowStatus::Released,
            StatusArg::Disputed => EscrowStatus::Disputed,
            StatusArg::ResolvedBuyer => EscrowStatus::ResolvedBuyer,
            StatusArg::ResolvedSeller => EscrowStatus::ResolvedSeller,
        }
    }
}

/// Execute the escrow subcommand.
pub fn run_escrow(args: &EscrowArgs, config: &EscrowConfig) -> Result<u8> {
    match &args.command {
        EscrowCommand::Split { amount, bps } => {
            print!("{}", split_report(*amount, bps.unwrap_or(config.default_commission_bps))?);
            Ok(0)
        }
        EscrowCommand::Disclose {
            status,
            name,
            address,
            phone,
        } => {
            let contact = ContactDetails {
                name: name.clone(),
                address: address.clone(),
                phone: phone.clone(),
            };
            let disclosed = disclose_contact((*status).into(), &contact);
            println!("{}", serde_json::to_string_pretty(&disclosed)?);
            Ok(0)
        }
        EscrowCommand::Transitions => {
            print!("{}", transition_table());
            Ok(0)
        }
    }
}

/// Render the split of `amount` at `bps`.
pub fn split_report(amount: i64, bps: u32) -> Result<String> {
    let rate = CommissionRate::from_bps(bps)?;
    let split = rate.split(Amount::new(amount)?);
    Ok(format!(
        "amount:          {amount}\nrate:            {rate}\nseller_receives: {}\ncommission:      {}\n",
        split.seller_receives.minor_units(),
        split.commission.minor_units()
    ))
}

fn transition_table() -> String {
    let mut out = String::new();
    for status in EscrowStatus::ALL {
        let next: Vec<&str> = status.valid_transitions().iter().map(|s| s.as_str()).collect();
        let next = if next.is_empty() {
            "(terminal)".to_string()
        } else {
            next.join(", ")
        };
        out.push_str(&format!("{:<16} -> {next}\n", status.as_str()));
    }
    out
}
