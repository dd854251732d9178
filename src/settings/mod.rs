//! The settings page: categories, spending limits and the admin-only system settings.

mod db;
mod page;

pub use db::{
    SETTING_KEY_MAX_LENGTH, SystemSetting, create_system_setting_table, get_all_settings,
    get_setting, upsert_setting,
};
pub use page::{
    SettingForm, SettingFormErrors, SettingsState, get_settings_page, setting_form,
    update_setting_endpoint,
};
