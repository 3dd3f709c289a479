use crate::domain::product::ProductObservation;
use crate::domain::view::Selection;

/// Rows whose type, term and bank are all selected, in input order.
pub fn filter(observations: &[ProductObservation], selection: &Selection) -> Vec<ProductObservation> {
    observations
        .iter()
        .filter(|o| selection.contains(o))
        .cloned()
        .collect()
}
