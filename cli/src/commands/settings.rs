use anyhow::Result;

use sugartrack_core::models::{Preferences, Theme, Unit};
use sugartrack_core::service::SugarService;

fn print_preferences(prefs: Preferences, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&prefs)?);
    } else {
        println!("Theme:        {}", prefs.theme);
        println!("Default unit: {}", prefs.default_unit);
    }
    Ok(())
}

pub(crate) fn cmd_settings_show(svc: &SugarService, json: bool) -> Result<()> {
    print_preferences(svc.preferences(), json)
}

pub(crate) fn cmd_settings_unit(svc: &mut SugarService, unit: Unit, json: bool) -> Result<()> {
    svc.set_default_unit(unit)?;
    if json {
        return print_preferences(svc.preferences(), true);
    }
    println!("Default unit set to {unit}");
    Ok(())
}

pub(crate) fn cmd_settings_theme(svc: &mut SugarService, theme: Theme, json: bool) -> Result<()> {
    svc.set_theme(theme)?;
    if json {
        return print_preferences(svc.preferences(), true);
    }
    println!("Theme set to {theme}");
    Ok(())
}

pub(crate) fn cmd_settings_toggle_theme(svc: &mut SugarService, json: bool) -> Result<()> {
    let theme = svc.toggle_theme()?;
    if json {
        return print_preferences(svc.preferences(), true);
    }
    println!("Theme switched to {theme}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip() {
        let mut svc = SugarService::new_in_memory().unwrap();
        cmd_settings_show(&svc, false).unwrap();

        cmd_settings_unit(&mut svc, Unit::MmolL, false).unwrap();
        cmd_settings_theme(&mut svc, Theme::Dark, true).unwrap();
        assert_eq!(svc.preferences().default_unit, Unit::MmolL);
        assert_eq!(svc.preferences().theme, Theme::Dark);

        cmd_settings_toggle_theme(&mut svc, false).unwrap();
        assert_eq!(svc.preferences().theme, Theme::Light);
    }
}
