use crate::operation::Operation;
use crate::utils::shell;

/// Enable and (re)start a system service. Clean stops and disables it, tolerating a
/// service that is already stopped or was never installed.
pub fn service(name: impl Into<String>) -> Operation {
    let unit = name.into();
    let clean_unit = unit.clone();
    Operation::new(
        format!("service:{}", unit),
        move |ctx| {
            let unit = shell::quote_arg(&unit);
            ctx.sudo(&format!("systemctl enable {}", unit))?;
            ctx.sudo(&format!("systemctl restart {}", unit))?;
            ctx.sudo(&format!("systemctl status {}", unit))?;
            Ok(())
        },
        move |ctx| {
            let unit = shell::quote_arg(&clean_unit);
            ctx.warn_only(|ctx| {
                ctx.sudo(&format!("systemctl stop {}", unit))?;
                ctx.sudo(&format!("systemctl disable {}", unit))?;
                Ok(())
            })
        },
    )
}
