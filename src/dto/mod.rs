pub mod paper_dto;
pub mod submission_dto;
pub mod test_dto;

use crate::error::{Error, Result};

/// Row offset of a 1-based page.
pub fn page_offset(page: i64, per_page: i64) -> Result<i64> {
    page.checked_sub(1)
        .and_then(|p| p.checked_mul(per_page))
        .filter(|offset| *offset >= 0)
        .ok_or_else(|| Error::BadRequest(format!("Page {} is out of range", page)))
}

pub fn total_pages(total: i64, per_page: i64) -> i64 {
    if per_page > 0 {
        (total + per_page - 1) / per_page
    } else {
        1
    }
}
