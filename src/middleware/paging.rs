use std::convert::Infallible;

use rocket::request::{FromRequest, Outcome};
use rocket::Request;

use crate::config::Config;

const FALLBACK_PAGE_LENGTH: u32 = 20;

/// Requested page of a listing, read from the `len`/`l` and `page`/`p` query values.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PageState {
    pub page_length: u32,
    pub page: u32,
}

impl PageState {
    fn from_values(length: Option<u32>, page: Option<u32>, default_length: u32) -> PageState {
        PageState {
            page_length: length.filter(|it| *it > 0).unwrap_or(default_length),
            page: page.unwrap_or(0),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PageState {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let length: Option<u32> = request
            .query_value("len")
            .and_then(|it| it.ok())
            .or_else(|| request.query_value("l").and_then(|it| it.ok()));

        let page: Option<u32> = request
            .query_value("page")
            .and_then(|it| it.ok())
            .or_else(|| request.query_value("p").and_then(|it| it.ok()));

        let default_length = request
            .rocket()
            .state::<Config>()
            .map(|it| it.evaluation.leaderboard_size)
            .unwrap_or(FALLBACK_PAGE_LENGTH);

        Outcome::Success(PageState::from_values(length, page, default_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_use_defaults() {
        assert_eq!(
            PageState::from_values(None, None, 10),
            PageState {
                page_length: 10,
                page: 0,
            }
        );
    }

    #[test]
    fn zero_length_falls_back_to_default() {
        let state = PageState::from_values(Some(0), Some(3), 15);
        assert_eq!(state.page_length, 15);
        assert_eq!(state.page, 3);
    }
}
