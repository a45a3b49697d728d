mod backup;
mod helpers;
mod insight;
mod overview;
mod record;
mod settings;

pub(crate) use backup::{cmd_export, cmd_import};
pub(crate) use insight::cmd_insight;
pub(crate) use overview::cmd_overview;
pub(crate) use record::{RecordEdit, cmd_add, cmd_convert, cmd_delete, cmd_edit, cmd_list};
pub(crate) use settings::{
    cmd_settings_show, cmd_settings_theme, cmd_settings_toggle_theme, cmd_settings_unit,
};
