use crate::types::places::PlaceResult;

/// One nearby search for a single place category.
pub trait PlacesSearch: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type Fut<'a>: Future<Output = Result<Vec<PlaceResult>, Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn nearby<'a>(&'a self, lat: f64, lng: f64, category: &'a str, radius: u32) -> Self::Fut<'a>;
}
