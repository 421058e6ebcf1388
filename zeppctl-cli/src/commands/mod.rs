use zeppctl::Ack;

pub mod cleanup;
pub mod configure;
pub mod event;
pub mod install;
pub mod interpreter;
pub mod notebook;
pub mod restart;
pub mod start;
pub mod status;
pub mod stop;

/// Print per-item acknowledgments; fail the command when any item was
/// rejected.
pub(crate) fn report_acks(acks: &[Ack]) -> anyhow::Result<()> {
    let mut rejected = 0;
    for ack in acks {
        match ack {
            Ack::Accepted { key, daemon_id } => match daemon_id {
                Some(id) => println!("{key}: accepted ({id})"),
                None => println!("{key}: accepted"),
            },
            Ack::Rejected { key, reason } => {
                eprintln!("{key}: rejected: {reason}");
                rejected += 1;
            }
        }
    }
    if rejected > 0 {
        anyhow::bail!("{rejected} of {} request(s) rejected", acks.len());
    }
    Ok(())
}
