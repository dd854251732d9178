//! Users: their accounts, administration by admins, and their own profile.

mod create;
mod db;
mod deactivate;
mod domain;
mod edit;
mod form;
mod list;
mod password;
mod profile;

pub use create::{create_user_endpoint, get_new_user_page};
pub use db::{
    UserUpdate, count_active_users, create_user, create_user_table, deactivate_user,
    get_all_users, get_user_by_id, get_user_by_username, update_password, update_profile,
    update_user,
};
pub use deactivate::deactivate_user_endpoint;
pub use domain::{
    NewUser, ProfileFields, User, UserFormErrors, UserID, validate_email, validate_profile_fields,
    validate_username,
};
pub use edit::{get_edit_user_page, update_user_endpoint};
pub use list::get_users_page;
pub use password::{PasswordHash, ValidatedPassword};
pub use profile::{change_password_endpoint, get_profile_page, update_profile_endpoint};
