//! Message composition for round-advance and completion notices.
//!
//! Pure "decide what to send" logic; delivery lives in [`super::mailer`].

use crate::tournament::models::Team;
use rust_decimal::Decimal;
use std::fmt::Write;

const SIGNATURE: &str = "~Tournament Tracker\n\n---------------------------\n\
    This message is system-generated from an unmonitored address. \
    Please do not reply.";

/// Whether an address is worth attempting delivery to.
///
/// Deliberately crude: non-empty, contains both `@` and `.`. Addresses that
/// fail this check are skipped without error rather than rejected upstream.
pub fn is_plausible_email(address: &str) -> bool {
    !address.is_empty() && address.contains('@') && address.contains('.')
}

/// Subject and body for one member's new-round notice.
///
/// `opponent` is absent for a bye, which gets a round-off message instead of
/// naming a competitor.
pub fn round_message(tournament_name: &str, opponent: Option<&Team>) -> (String, String) {
    match opponent {
        Some(opponent) => {
            let subject = format!(
                "In {tournament_name}, you have a new matchup with {}",
                opponent.name
            );
            let body = format!(
                "You have a new matchup.\nCompetitor: {}\n\nHave a great time!\n{SIGNATURE}",
                opponent.name
            );
            (subject, body)
        }
        None => {
            let subject =
                format!("In {tournament_name}, you have progressed to the next round (bye week)");
            let body = format!("Enjoy your round off!\n{SIGNATURE}");
            (subject, body)
        }
    }
}

/// Subject and body for the single tournament-completion notice sent to all
/// entrants. Payout lines appear only when the payout is nonzero.
pub fn completion_message(
    tournament_name: &str,
    champion: &Team,
    champion_payout: Decimal,
    runner_up: &Team,
    runner_up_payout: Decimal,
) -> (String, String) {
    let subject = format!("In {tournament_name}, {} has won!", champion.name);

    let mut body = String::from("We have a WINNER!\n");
    let _ = writeln!(
        body,
        "Congratulations to {} on a great tournament.",
        champion.name
    );
    if champion_payout > Decimal::ZERO {
        let _ = writeln!(body, "{} will receive ${champion_payout}", champion.name);
    }
    if runner_up_payout > Decimal::ZERO {
        let _ = writeln!(body, "{} will receive ${runner_up_payout}", runner_up.name);
    }
    body.push_str(SIGNATURE);

    (subject, body)
}
