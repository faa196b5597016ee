use crate::domain::customer::Customer;
use crate::domain::movie::Movie;
use crate::domain::ports::Stores;
use crate::error::{RentalError, Result};
use serde::Deserialize;
use std::io::Read;
use tracing::{debug, info};

/// Movies and customers loaded from a JSON document before events are replayed.
///
/// ```json
/// {
///   "movies": [{ "id": "m1", "title": "Heat", "daily_rental_rate": 2, "available_stock": 3 }],
///   "customers": [{ "id": "c1", "name": "Ada", "phone": "5550100", "is_gold": true }]
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub movies: Vec<Movie>,
    #[serde(default)]
    pub customers: Vec<Customer>,
}

impl Catalog {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let catalog: Catalog = serde_json::from_reader(source)
            .map_err(|e| RentalError::CatalogError(e.to_string()))?;

        for movie in &catalog.movies {
            movie.validate()?;
        }
        Ok(catalog)
    }

    /// Writes the catalog into `stores`.
    ///
    /// Movies already present keep their stored record, so reseeding a
    /// persistent store never resets stock that rentals have moved. Customers
    /// are upserted.
    pub async fn seed(self, stores: &Stores) -> Result<()> {
        let mut added = 0;
        for movie in self.movies {
            if stores.catalog.find_movie(&movie.id).await?.is_some() {
                debug!(movie = %movie.id, "Movie already stored, keeping it");
                continue;
            }
            stores.catalog.upsert_movie(movie).await?;
            added += 1;
        }

        let customers = self.customers.len();
        for customer in self.customers {
            stores.customers.upsert_customer(customer).await?;
        }

        info!(movies = added, customers, "Catalog seeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::CustomerId;
    use crate::domain::movie::MovieId;
    use crate::infrastructure::in_memory::in_memory_stores;
    use rust_decimal_macros::dec;

    const CATALOG: &str = r#"{
        "movies": [
            { "id": "m1", "title": "Heat", "daily_rental_rate": 2, "available_stock": 3 },
            { "id": "m2", "title": "Alien", "daily_rental_rate": "1.5", "available_stock": 0 }
        ],
        "customers": [
            { "id": "c1", "name": "Ada", "phone": "5550100" }
        ]
    }"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = Catalog::from_reader(CATALOG.as_bytes()).unwrap();
        assert_eq!(catalog.movies.len(), 2);
        assert_eq!(catalog.movies[1].daily_rental_rate.value(), dec!(1.5));
        assert!(!catalog.customers[0].is_gold);
    }

    #[test]
    fn test_rejects_invalid_movies() {
        let negative = r#"{ "movies": [{ "id": "m1", "title": "Heat", "daily_rental_rate": -1, "available_stock": 1 }] }"#;
        assert!(matches!(
            Catalog::from_reader(negative.as_bytes()),
            Err(RentalError::CatalogError(_))
        ));

        let untitled = r#"{ "movies": [{ "id": "m1", "title": " ", "daily_rental_rate": 1, "available_stock": 1 }] }"#;
        assert!(matches!(
            Catalog::from_reader(untitled.as_bytes()),
            Err(RentalError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_seed_keeps_existing_stock() {
        let stores = in_memory_stores();
        Catalog::from_reader(CATALOG.as_bytes())
            .unwrap()
            .seed(&stores)
            .await
            .unwrap();

        let mut heat = stores
            .catalog
            .find_movie(&MovieId::new("m1"))
            .await
            .unwrap()
            .unwrap();
        heat.available_stock = 1;
        stores.catalog.upsert_movie(heat).await.unwrap();

        Catalog::from_reader(CATALOG.as_bytes())
            .unwrap()
            .seed(&stores)
            .await
            .unwrap();

        let heat = stores
            .catalog
            .find_movie(&MovieId::new("m1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(heat.available_stock, 1);
        assert!(
            stores
                .customers
                .find_customer(&CustomerId::new("c1"))
                .await
                .unwrap()
                .is_some()
        );
    }
}
