use crate::error::Result;
use crate::operation::{Mode, Operation};
use crate::utils::shell;

/// Guarded package manager command. Installs when `rpm -qa` has no line matching
/// `query`; removes when it has at least one.
pub fn yum_command(query: &str, package: &str, mode: Mode) -> String {
    let (compare, action) = match mode {
        Mode::Install => ("-eq", "install"),
        Mode::Clean => ("-gt", "remove"),
    };
    format!(
        "if [ \"$(rpm -qa | grep -c {})\" {} 0 ]; then yum {} --assumeyes --quiet {}; fi",
        shell::quote_arg(query),
        compare,
        action,
        shell::quote_arg(package)
    )
}

pub fn package(query: impl Into<String>, package: impl Into<String>) -> Operation {
    let query = query.into();
    let package = package.into();
    let name = format!("package:{}", package);
    let (q, p) = (query.clone(), package.clone());
    Operation::new(
        name,
        move |ctx| ctx.sudo(&yum_command(&q, &p, Mode::Install)).map(|_| ()),
        move |ctx| ctx.sudo(&yum_command(&query, &package, Mode::Clean)).map(|_| ()),
    )
}

/// One [`package`] per whitespace-separated name, each queried by its own name.
pub fn packages(name: impl Into<String>, list: &str) -> Operation {
    let names: Vec<String> = list.split_whitespace().map(str::to_string).collect();
    let clean_names = names.clone();
    let each = |names: &[String], ctx: &crate::context::ExecutionContext, mode: Mode| -> Result<()> {
        for package in names {
            ctx.sudo(&yum_command(package, package, mode))?;
        }
        Ok(())
    };
    Operation::new(
        name,
        move |ctx| each(&names, ctx, Mode::Install),
        move |ctx| each(&clean_names, ctx, Mode::Clean),
    )
}

/// Repository definition shipped as an RPM. Installed from `uri` only when absent.
pub fn repo_rpm(name: impl Into<String>, uri: impl Into<String>) -> Operation {
    let name = name.into();
    let uri = uri.into();
    let query = name.clone();
    Operation::new(
        format!("repo:{}", name),
        move |ctx| {
            ctx.sudo(&format!(
                "if [ -z \"$(rpm -qa | grep {})\" ]; then yum install --assumeyes --quiet {}; fi",
                shell::quote_arg(&query),
                shell::quote_arg(&uri)
            ))
            .map(|_| ())
        },
        move |ctx| ctx.sudo(&yum_command(&name, &name, Mode::Clean)).map(|_| ()),
    )
}

/// Ruby gem for the connecting user.
pub fn gem(name: impl Into<String>) -> Operation {
    let gem = name.into();
    let clean_gem = gem.clone();
    Operation::new(
        format!("gem:{}", gem),
        move |ctx| {
            let gem = shell::quote_arg(&gem);
            ctx.run(&format!("gem list -i {} || gem install {}", gem, gem))
                .map(|_| ())
        },
        move |ctx| {
            let gem = shell::quote_arg(&clean_gem);
            ctx.run(&format!(
                "if gem list -i {}; then gem uninstall --quiet --executables {}; fi",
                gem, gem
            ))
            .map(|_| ())
        },
    )
}
