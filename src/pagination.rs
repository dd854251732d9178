//! Offset pagination shared by the paged lists.

use maud::{Markup, html};

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of rows to display per page.
    pub page_size: u64,
    /// The maximum number of page links to show in the pagination indicator.
    pub max_pages: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            page_size: 20,
            max_pages: 5,
        }
    }
}

/// The number of pages needed to show `row_count` rows.
pub fn page_count(row_count: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }

    row_count.div_ceil(page_size)
}

/// The row offset of the first row on the 1-based `page`.
pub fn page_offset(page: u64, page_size: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(page_size)
}

#[derive(Debug, PartialEq, Eq)]
pub enum PaginationIndicator {
    Page(u64),
    CurrPage(u64),
    Ellipsis,
    NextButton(u64),
    BackButton(u64),
}

/// Build the list of page links to show for `curr_page` out of `page_count` pages.
///
/// At most `max_pages` consecutive pages are shown around the current page, with
/// the first and last pages always reachable.
pub fn create_pagination_indicators(
    curr_page: u64,
    page_count: u64,
    max_pages: u64,
) -> Vec<PaginationIndicator> {
    if page_count == 0 {
        return Vec::new();
    }

    let window = max_pages.clamp(1, page_count);
    let window_start = curr_page
        .saturating_sub(window / 2)
        .clamp(1, page_count - window + 1);
    let window_end = window_start + window - 1;

    let mut indicators = Vec::new();

    if curr_page > 1 {
        indicators.push(PaginationIndicator::BackButton(curr_page - 1));
    }

    if window_start > 1 {
        indicators.push(PaginationIndicator::Page(1));

        if window_start > 2 {
            indicators.push(PaginationIndicator::Ellipsis);
        }
    }

    indicators.extend((window_start..=window_end).map(|page| {
        if page == curr_page {
            PaginationIndicator::CurrPage(page)
        } else {
            PaginationIndicator::Page(page)
        }
    }));

    if window_end < page_count {
        if window_end < page_count - 1 {
            indicators.push(PaginationIndicator::Ellipsis);
        }

        indicators.push(PaginationIndicator::Page(page_count));
    }

    if curr_page < page_count {
        indicators.push(PaginationIndicator::NextButton(curr_page + 1));
    }

    indicators
}

/// Render the pagination indicators as a list of links.
///
/// `page_url` maps a page number to the URL that displays that page.
pub fn pagination_nav(
    curr_page: u64,
    page_count: u64,
    max_pages: u64,
    page_url: impl Fn(u64) -> String,
) -> Markup {
    let indicators = create_pagination_indicators(curr_page, page_count, max_pages);
    let link_style = "block px-3 py-2 rounded text-blue-600 hover:bg-gray-100 dark:hover:bg-gray-700";

    html! {
        @if !indicators.is_empty() {
            nav class="pagination mt-4"
            {
                ul class="flex items-center gap-1"
                {
                    @for indicator in indicators {
                        li {
                            @match indicator {
                                PaginationIndicator::Page(page) => {
                                    a href=(page_url(page)) class=(link_style) { (page) }
                                }
                                PaginationIndicator::CurrPage(page) => {
                                    span aria-current="page" class="block px-3 py-2 rounded bg-blue-600 text-white" { (page) }
                                }
                                PaginationIndicator::Ellipsis => {
                                    span class="px-2" { "..." }
                                }
                                PaginationIndicator::BackButton(page) => {
                                    a href=(page_url(page)) class=(link_style) { "Back" }
                                }
                                PaginationIndicator::NextButton(page) => {
                                    a href=(page_url(page)) class=(link_style) { "Next" }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod pagination_tests {
    use super::{PaginationIndicator, create_pagination_indicators, page_count, page_offset};

    #[test]
    fn counts_partial_pages() {
        assert_eq!(page_count(0, 20), 0);
        assert_eq!(page_count(20, 20), 1);
        assert_eq!(page_count(21, 20), 2);
    }

    #[test]
    fn offset_for_first_page_is_zero() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(0, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
    }

    #[test]
    fn no_indicators_without_pages() {
        assert!(create_pagination_indicators(1, 0, 5).is_empty());
    }

    #[test]
    fn shows_all_pages_when_they_fit() {
        let got = create_pagination_indicators(2, 3, 5);

        assert_eq!(
            got,
            [
                PaginationIndicator::BackButton(1),
                PaginationIndicator::Page(1),
                PaginationIndicator::CurrPage(2),
                PaginationIndicator::Page(3),
                PaginationIndicator::NextButton(3),
            ]
        );
    }

    #[test]
    fn shows_trailing_ellipsis_on_first_page() {
        let got = create_pagination_indicators(1, 10, 5);

        assert_eq!(
            got,
            [
                PaginationIndicator::CurrPage(1),
                PaginationIndicator::Page(2),
                PaginationIndicator::Page(3),
                PaginationIndicator::Page(4),
                PaginationIndicator::Page(5),
                PaginationIndicator::Ellipsis,
                PaginationIndicator::Page(10),
                PaginationIndicator::NextButton(2),
            ]
        );
    }

    #[test]
    fn shows_both_ellipses_in_the_middle() {
        let got = create_pagination_indicators(5, 10, 5);

        assert_eq!(
            got,
            [
                PaginationIndicator::BackButton(4),
                PaginationIndicator::Page(1),
                PaginationIndicator::Ellipsis,
                PaginationIndicator::Page(3),
                PaginationIndicator::Page(4),
                PaginationIndicator::CurrPage(5),
                PaginationIndicator::Page(6),
                PaginationIndicator::Page(7),
                PaginationIndicator::Ellipsis,
                PaginationIndicator::Page(10),
                PaginationIndicator::NextButton(6),
            ]
        );
    }

    #[test]
    fn shows_leading_ellipsis_on_last_page() {
        let got = create_pagination_indicators(10, 10, 5);

        assert_eq!(
            got,
            [
                PaginationIndicator::BackButton(9),
                PaginationIndicator::Page(1),
                PaginationIndicator::Ellipsis,
                PaginationIndicator::Page(6),
                PaginationIndicator::Page(7),
                PaginationIndicator::Page(8),
                PaginationIndicator::Page(9),
                PaginationIndicator::CurrPage(10),
            ]
        );
    }
}
