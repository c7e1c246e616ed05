use crate::messaging::LineClient;
use crate::services::user;
use crate::weather::{ReportStyle, WeatherClient};

/// One full pass over every subscription: look up the registered city and
/// push the report. A failure only ever skips that user; outcomes are
/// visible in the logs, not in the return value.
#[tracing::instrument(skip_all)]
pub async fn run(
    users: &user::Service,
    weather: &WeatherClient,
    line: &LineClient,
) -> anyhow::Result<()> {
    log::info!("Starting the daily weather broadcast");

    let subscriptions = users.list_all().await?;
    if subscriptions.is_empty() {
        log::info!("No registered users, nothing to send");
        return Ok(());
    }

    log::info!("Sending a weather report to {} users", subscriptions.len());

    for subscription in subscriptions {
        // lookup_message absorbs provider failures, so an unreachable
        // weather API still results in a push carrying the error text.
        let report = weather.lookup_message(&subscription.city, ReportStyle::Current).await;
        let message = format!("Today's weather for {}\n{}", subscription.city, report);

        match line.push_text(&subscription.line_user_id, &message).await {
            Ok(()) => {
                tracing::debug!(
                    "Pushed the {} report to {}",
                    subscription.city,
                    subscription.line_user_id
                );
            }
            Err(err) => {
                log::error!(
                    "Failed to push the report to {}: {}",
                    subscription.line_user_id,
                    err
                );
            }
        }
    }

    log::info!("Daily weather broadcast finished");

    Ok(())
}
