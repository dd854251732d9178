//! Daily and monthly spending limits and the checks against them.

mod check_api;
mod core;
mod create;
mod delete;
mod evaluator;

pub use check_api::{SpendingAlert, SpendingCheck, get_spending_check};
pub use core::{
    LimitPeriod, NewSpendingLimit, SpendingLimit, create_spending_limit,
    create_spending_limit_table, delete_spending_limit, get_active_limits_for_category,
    get_all_spending_limits, get_spending_limit, get_spending_limits_for_user,
};
pub use create::{
    SpendingLimitForm, SpendingLimitFormErrors, SpendingLimitState,
    create_spending_limit_endpoint, spending_limit_form,
};
pub use delete::delete_spending_limit_endpoint;
pub use evaluator::{
    LimitStatus, WARNING_RATIO, evaluate_limit, get_spent_amount, period_start,
};
