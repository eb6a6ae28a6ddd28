use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;

/// A booking as listed by the reservation platform.
///
/// Dates arrive optional because the upstream occasionally omits them for
/// cancelled or malformed records; ingestion rejects such entries before
/// persistence instead of failing the whole page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedBooking {
    pub booking_code: String,
    pub guest_name: String,
    #[serde(default)]
    pub platform: String,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    /// Nightly-stay portion of the price
    pub base_amount: Decimal,
    /// Extras (experiences, late checkout, ...)
    #[serde(default)]
    pub extras_amount: Decimal,
    #[serde(default)]
    pub cleaning_fee: Decimal,
}

impl FeedBooking {
    /// All-in price: base + extras + cleaning fee.
    pub fn total_amount(&self) -> Decimal {
        self.base_amount + self.extras_amount + self.cleaning_fee
    }
}

/// One page of the paginated booking listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub bookings: Vec<FeedBooking>,
    pub next_page: Option<u32>,
}

/// Consumed interface of the reservation platform.
///
/// Transport details live behind this trait; the pipeline only relies on a
/// paginated listing filtered by property and date range.
pub trait ReservationFeed {
    fn fetch_page(
        &self,
        property_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        page: u32,
    ) -> impl std::future::Future<Output = Result<FeedPage, AppError>> + Send;
}

/// Drains every page of the listing into one vector.
pub async fn fetch_all_bookings<F: ReservationFeed>(
    feed: &F,
    property_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<FeedBooking>, AppError> {
    let mut bookings = Vec::new();
    let mut page = 1;
    loop {
        let batch = feed.fetch_page(property_id, from, to, page).await?;
        bookings.extend(batch.bookings);
        match batch.next_page {
            Some(next) if next > page => page = next,
            _ => break,
        }
    }
    Ok(bookings)
}

/// HTTP client for the reservation-platform feed.
///
/// Constructed once from [`AppConfig`] in `main` and injected wherever the
/// feed is consumed. Failures surface verbatim as upstream errors; the
/// caller re-invokes the whole operation, there is no retry here.
#[derive(Debug, Clone)]
pub struct PlatformFeedClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PlatformFeedClient {
    pub fn new(config: &AppConfig) -> Self {
        PlatformFeedClient {
            http: reqwest::Client::new(),
            base_url: config.feed_base_url.clone(),
            api_key: config.feed_api_key.clone(),
        }
    }
}

impl ReservationFeed for PlatformFeedClient {
    async fn fetch_page(
        &self,
        property_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        page: u32,
    ) -> Result<FeedPage, AppError> {
        let url = format!("{}/v1/bookings", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[
                ("property_id", property_id.to_string()),
                ("from", from.to_string()),
                ("to", to.to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: FeedPage = response.json().await?;
        Ok(body)
    }
}
