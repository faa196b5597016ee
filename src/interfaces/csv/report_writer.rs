use crate::domain::movie::Movie;
use crate::domain::rental::Rental;
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct StockRow<'a> {
    movie: &'a str,
    title: &'a str,
    available: u32,
}

#[derive(Serialize)]
struct RentalRow<'a> {
    rental: String,
    customer: &'a str,
    movie: &'a str,
    checked_out: String,
    returned: Option<String>,
    fee: Option<Decimal>,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Writes end-of-run reports as CSV, header row first.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// `movie,title,available`, one row per movie in the given order.
    pub fn write_stock(&mut self, movies: &[Movie]) -> Result<()> {
        for movie in movies {
            self.writer.serialize(StockRow {
                movie: movie.id.as_str(),
                title: &movie.title,
                available: movie.available_stock,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// `rental,customer,movie,checked_out,returned,fee`. Open rentals leave the
    /// last two columns empty.
    pub fn write_rentals(&mut self, rentals: &[Rental]) -> Result<()> {
        for rental in rentals {
            self.writer.serialize(RentalRow {
                rental: rental.id.to_string(),
                customer: rental.customer.id.as_str(),
                movie: rental.movie.id.as_str(),
                checked_out: timestamp(rental.checked_out_at),
                returned: rental.returned_at.map(timestamp),
                fee: rental.rental_fee,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
