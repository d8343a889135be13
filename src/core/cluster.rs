//! The cluster's target catalog: repository, base packages, coordination quorum,
//! scheduler masters and their frameworks, workers, shared tooling, and the web proxy.

use std::net::ToSocketAddrs;
use std::path::Path;

use crate::config::AppConfig;
use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::operation::Operation;
use crate::ops::{self, bundle, command, tolerant};
use crate::paths::{InstallPaths, OPT};
use crate::target::{Aggregate, HostScope, Stage, Step, Target, TargetRegistry};
use crate::core::template::RenderContext;
use crate::topology::Role;
use crate::utils::shell;

pub const MESOSPHERE_REPO_URI: &str =
    "http://repos.mesosphere.com/el/7/noarch/RPMS/mesosphere-el-repo-7-1.noarch.rpm";

const JDK_DOWNLOAD_URI: &str =
    "http://download.oracle.com/otn-pub/java/jdk/8u60-b27/jdk-8u60-linux-x64.tar.gz";
const ORACLE_LICENSE_COOKIE: &str =
    "Cookie: gpw_e24=http%3A%2F%2Fwww.oracle.com%2F; oraclelicense=accept-securebackup-cookie";

const SYSTEMD_DIR: &str = "/usr/lib/systemd/system";
const IPTABLES: &str = "/etc/sysconfig/iptables";
const MESOS_LOG_DIR: &str = "/var/log/mesos";

/// Every node that is part of the cluster proper.
const CLUSTER_ROLES: [Role; 3] = [Role::Head, Role::Worker, Role::Database];

/// Tarballs unpacked into the shared stack after spark and maven.
const TOOLING: [&str; 6] = ["jdk", "scala", "node", "mongodb", "hadoop", "tachyon"];

fn op(operation: Operation) -> Step {
    Step::op(operation)
}

fn sub(name: &str) -> Step {
    Step::target(name)
}

fn conf(paths: &InstallPaths, relative: &str) -> String {
    paths.conf_file(relative)
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// `zk://<servers>/mesos` for the scheduler masters and agents.
pub fn zk_url(app: &AppConfig) -> String {
    format!("zk://{}/mesos", app.coordination_servers())
}

/// First IPv4 address of `host` as seen from the controlling machine, or the name
/// itself when it does not resolve.
fn resolve_address(host: &str) -> String {
    (host, 0)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.find(|a| a.is_ipv4()))
        .map(|a| a.ip().to_string())
        .unwrap_or_else(|| host.to_string())
}

fn base_apps(app: &AppConfig) -> Operation {
    bundle(
        "base-apps",
        app.base_apps
            .iter()
            .map(|p| ops::package(p.query.as_str(), p.package.as_str()))
            .collect(),
    )
}

fn archive(app: &AppConfig, name: &str) -> Result<Operation> {
    let source = app
        .dist_source(name)
        .ok_or_else(|| Error::config_missing_key(format!("dist.{}", name), None))?;
    if source.contains("://") {
        Ok(ops::tarball(name, source))
    } else {
        Ok(ops::local_tarball(name, source))
    }
}

fn mesosphere_repo() -> Target {
    Target::new("mesosphere-repo", HostScope::roles(&[Role::Head, Role::Worker]))
        .describe("Mesosphere package repository")
        .body(vec![op(ops::repo_rpm("mesosphere-el-repo", MESOSPHERE_REPO_URI))])
}

fn base(app: &AppConfig, paths: &InstallPaths) -> Target {
    let user = app.user.clone();
    let bashrc = command(
        "bashrc",
        format!(
            "cp {} {}",
            shell::quote_path(&conf(paths, &format!("{}.bashrc", user))),
            shell::quote_path(&format!("/home/{}/.bashrc", user))
        ),
        "",
        true,
    );
    let env_sh = command(
        "env-sh",
        format!(
            "if [ \"$(grep -c stars ~/.bashrc)\" -eq 0 ]; then echo source {} >> ~/.bashrc; fi",
            shell::quote_path(&conf(paths, "env.sh"))
        ),
        "",
        false,
    );
    let zk = command(
        "mesos-zk",
        format!(
            "if [ -d /etc/mesos ]; then echo {} > /etc/mesos/zk; fi",
            zk_url(app)
        ),
        "rm -rf /etc/mesos/zk",
        true,
    );

    let apps = op(base_apps(app));
    let zk = op(zk);
    Target::new("base", HostScope::roles(&CLUSTER_ROLES))
        .describe("Base packages, shell environment and coordination address")
        .parallel()
        .install_order(vec![apps.clone(), op(bashrc), op(env_sh), zk.clone()])
        .clean_order(vec![zk, apps])
}

fn zoo(paths: &InstallPaths) -> Target {
    let package = op(ops::package("mesosphere-zookeeper", "mesosphere-zookeeper"));
    let service = op(ops::service("zookeeper"));
    let config = ops::config_template_with(
        paths.conf().join("zoo.cfg"),
        "/etc/zookeeper/conf/zoo.cfg",
        true,
        |ctx| {
            let head = ctx
                .topology()
                .hosts(Role::Head)
                .first()
                .cloned()
                .ok_or_else(|| Error::config_missing_key("headNodes", None))?;
            Ok(RenderContext::new().with("IPADDR", resolve_address(&head)))
        },
    );
    let state = command(
        "zookeeper-state",
        "",
        "rm -rf /var/lib/zookeeper /var/log/zookeeper /etc/zookeeper",
        true,
    );

    Target::new("zoo", HostScope::roles(&[Role::Coordination]))
        .describe("Coordination service quorum")
        .parallel()
        .install_order(vec![package.clone(), op(config), service.clone()])
        .clean_order(vec![service, package, op(state)])
}

fn network_env() -> Target {
    Target::new("network-env", HostScope::roles(&[Role::Head]))
        .describe("Publish the node address in /etc/network-environment")
        .body(vec![op(command(
            "network-env",
            "echo IP=$(hostname -I) > /etc/network-environment",
            "rm -f /etc/network-environment",
            true,
        ))])
}

fn firewall(paths: &InstallPaths) -> Target {
    let rules = op(ops::backup_and_replace(conf(paths, "iptables.headnode"), IPTABLES));
    // Spark picks random ports for driver/worker traffic.
    let stop = op(command("iptables-stop", "service iptables stop", "service iptables stop", true));
    Target::new("firewall", HostScope::roles(&[Role::Head]))
        .describe("Head node firewall rules")
        .parallel()
        .install_order(vec![rules.clone(), stop.clone()])
        .clean_order(vec![rules, stop])
}

fn mesos(app: &AppConfig, paths: &InstallPaths) -> Target {
    let package = op(ops::package("mesos-", "mesos"));
    let quorum = op(command(
        "mesos-quorum",
        "rm -rf /etc/mesos-master/quorum.rpm* && mkdir -p /etc/mesos-master && echo 2 > /etc/mesos-master/quorum",
        "rm -rf /etc/mesos-master/quorum",
        true,
    ));
    let zk = zk_url(app);
    let unit = op(ops::config_template_with(
        paths.conf().join("mesos/mesos-master.service.custom"),
        format!("{}/mesos-master.service", SYSTEMD_DIR),
        true,
        move |ctx| {
            let ip = ctx.probe("hostname -I")?;
            let ip = ip.stdout.split_whitespace().next().unwrap_or("").to_string();
            Ok(RenderContext::new()
                .with("EXE", "/usr/sbin/mesos-master")
                .with("IP", ip)
                .with("ZK", zk.as_str())
                .with("LOGLEVEL", "WARNING")
                .with("LOGDIR", MESOS_LOG_DIR)
                .with("QUORUM", 2))
        },
    ));
    let service = op(ops::service("mesos-master"));

    Target::new("mesos", HostScope::roles(&[Role::Head]))
        .describe("Scheduler master")
        .install_order(vec![
            package.clone(),
            quorum.clone(),
            op(ops::owned_dir(MESOS_LOG_DIR)),
            op(ops::owned_dir("/var/lib/mesos")),
            unit.clone(),
            service.clone(),
        ])
        .clean_order(vec![service, quorum, unit, package])
}

fn marathon() -> Target {
    let package = op(ops::package("marathon-", "marathon"));
    let client = op(ops::gem("marathon_client"));
    Target::new("marathon", HostScope::roles(&[Role::Head]))
        .describe("Long-running service framework")
        .parallel()
        .install_order(vec![package.clone(), client.clone()])
        .clean_order(vec![client, package])
}

fn chronos() -> Target {
    let package = op(ops::package("chronos-", "chronos"));
    let service = op(ops::service("chronos"));
    Target::new("chronos", HostScope::roles(&[Role::Head]))
        .describe("Job scheduler framework")
        .parallel()
        .install_order(vec![package.clone(), service.clone()])
        .clean_order(vec![service, package])
}

fn orchestration(app: &AppConfig, paths: &InstallPaths) -> Target {
    let checkout_dir = InstallPaths::opt("orchestration");
    let package = op(ops::package("haproxy-", "haproxy"));
    let log_dir = op(ops::owned_dir("/var/log/orchestration"));
    let checkout = op(ops::git_checkout("orchestration", app.orchestration_git_uri.as_str(), OPT));
    let local_config = command(
        "orchestration-config",
        format!(
            "cp {} {}",
            shell::quote_path(&conf(paths, "orchestration/local_config.json")),
            shell::quote_path(&format!("{}/etc", checkout_dir))
        ),
        "",
        false,
    );
    let unit = op(ops::installed_file(
        conf(paths, "orchestration/orchestration.service"),
        format!("{}/orchestration.service", SYSTEMD_DIR),
    ));
    let haproxy = ops::service("haproxy");
    let service = op(ops::service("orchestration"));

    Target::new("orchestration", HostScope::roles(&[Role::Head]))
        .describe("Orchestration server behind haproxy")
        .parallel()
        .install_order(vec![
            package.clone(),
            op(ops::owned_dir(OPT)),
            log_dir.clone(),
            op(ops::owned_file("/etc/haproxy/haproxy.auto.cfg")),
            checkout.clone(),
            op(local_config),
            unit.clone(),
            op(command("haproxy-stop", "service haproxy stop", "", true)),
            service.clone(),
        ])
        .clean_order(vec![service, op(haproxy), package, log_dir, checkout, unit])
}

fn head() -> Target {
    Target::new("head", HostScope::roles(&[Role::Head]))
        .describe("Configure head nodes")
        .prelude(vec![sub("mesosphere-repo"), sub("base"), sub("zoo")])
        .install_order(vec![
            sub("network-env"),
            sub("firewall"),
            sub("mesos"),
            sub("marathon"),
            sub("chronos"),
            sub("orchestration"),
        ])
        .clean_order(vec![
            sub("orchestration"),
            sub("chronos"),
            sub("marathon"),
            sub("mesos"),
            sub("firewall"),
        ])
}

fn work(app: &AppConfig, paths: &InstallPaths) -> Target {
    let package = ops::package("mesos-", "mesos");
    let zk = zk_url(app);
    let unit = op(ops::config_template(
        paths.conf().join("mesos/mesos-slave.service.custom"),
        RenderContext::new()
            .with("EXE", "/usr/sbin/mesos-slave")
            .with("ZK", zk)
            .with("LOGDIR", MESOS_LOG_DIR),
        format!("{}/mesos-slave.service", SYSTEMD_DIR),
        true,
    ));
    let agent = op(ops::service("mesos-slave"));
    let iptables = command("iptables", "service iptables stop", "service iptables start", true);

    Target::new("work", HostScope::roles(&[Role::Worker]))
        .describe("Configure worker nodes")
        .parallel()
        .prelude(vec![
            sub("mesosphere-repo"),
            // Needed by applications built on the workers.
            op(ops::packages("devel-libs", "postgresql-devel")),
            sub("base"),
        ])
        .install_order(vec![
            op(package.clone()),
            unit.clone(),
            agent.clone(),
            op(iptables.clone()),
            op(ops::owned_dir(OPT)),
        ])
        .clean_order(vec![op(tolerant(iptables)), agent, unit, op(tolerant(package))])
}

fn core(app: &AppConfig, paths: &InstallPaths) -> Result<Target> {
    let dist = display(&paths.dist());
    let stack = display(&paths.stack());

    let layout = command(
        "layout",
        format!(
            "mkdir -p {} {} {}",
            shell::quote_path(&dist),
            shell::quote_path(&stack),
            shell::quote_path(&display(&paths.app()))
        ),
        "",
        false,
    );
    let jdk_dist = dist.clone();
    let jdk_download = Operation::new(
        "jdk-download",
        move |ctx| {
            ctx.in_dir(jdk_dist.as_str())
                .run(&format!(
                    "wget --quiet --timestamping --no-cookies --no-check-certificate --header {} {}",
                    shell::quote_arg(ORACLE_LICENSE_COOKIE),
                    shell::quote_arg(JDK_DOWNLOAD_URI)
                ))
                .map(|_| ())
        },
        |_| Ok(()),
    )
    .irreversible();

    let spark_env = ops::config_template(
        paths.conf().join("spark/spark-env.sh"),
        RenderContext::new()
            .with("STARS_CONF", display(paths.conf()))
            .with("STARS_DIST", dist.as_str()),
        format!("{}/spark/current/conf/spark-env.sh", stack),
        false,
    );
    let maven_settings = command(
        "maven-settings",
        format!(
            "cp {} {}",
            shell::quote_path(&conf(paths, "maven/settings.xml")),
            shell::quote_path(&format!("{}/maven/current/conf", stack))
        ),
        "",
        false,
    );

    let mut install = vec![
        op(layout),
        op(jdk_download),
        op(archive(app, "spark")?),
        op(spark_env),
        op(archive(app, "maven")?),
        op(maven_settings),
    ];
    for name in TOOLING {
        install.push(op(archive(app, name)?));
    }
    let clean = install.iter().rev().cloned().collect();

    Ok(Target::new("core", HostScope::roles(&[Role::Coordination]))
        .describe("Shared tooling unpacked into the stack")
        .parallel()
        .install_order(install)
        .clean_order(clean))
}

fn web(app: &AppConfig, paths: &InstallPaths) -> Target {
    let nginx = op(ops::package("nginx", "nginx"));
    let apps = op(base_apps(app));
    let rules = op(ops::backup_and_replace(conf(paths, "iptables.web"), IPTABLES));
    let restart = op(command(
        "iptables-restart",
        "service iptables restart && service iptables status",
        "",
        true,
    ));
    let proxy_conf = op(command(
        "nginx-conf",
        format!(
            "cp {} /etc/nginx && cp -r {} /etc/nginx",
            shell::quote_path(&conf(paths, "nginx/nginx.conf")),
            shell::quote_path(&conf(paths, "nginx/conf.d"))
        ),
        "rm -rf /etc/nginx",
        true,
    ));
    let proxy = op(ops::service("nginx"));

    Target::new("web", HostScope::Local)
        .describe("Web proxy on the controlling machine")
        .install_order(vec![
            nginx.clone(),
            apps.clone(),
            rules,
            restart,
            proxy_conf.clone(),
            proxy,
        ])
        .clean_order(vec![
            nginx,
            op(ops::package("nginx-filesystem", "nginx-filesystem")),
            proxy_conf,
            apps,
        ])
}

fn status() -> Result<Target> {
    let show = |ctx: &ExecutionContext| -> Result<()> {
        for command in ["free -h", "vmstat"] {
            let output = ctx.run(command)?;
            log_status!("status", "[{}] {}\n{}", ctx.host_label(), command, output.stdout.trim_end());
        }
        Ok(())
    };
    let report = Operation::builder("status")
        .describe("Print memory and VM statistics")
        .install(show)
        .clean(show)
        .irreversible()
        .build()?;
    Ok(Target::new("status", HostScope::roles(&CLUSTER_ROLES))
        .describe("Memory and VM statistics")
        .parallel()
        .body(vec![op(report)]))
}

fn all() -> Aggregate {
    let stage = |target: &str, roles: &[Role]| Stage {
        target: target.to_string(),
        scope: HostScope::roles(roles),
    };
    Aggregate {
        name: "all".to_string(),
        description: "Base, core tooling, head nodes, then workers".to_string(),
        stages: vec![
            stage("base", &CLUSTER_ROLES),
            stage("core", &[Role::Worker]),
            stage("head", &[Role::Head]),
            stage("work", &[Role::Worker]),
        ],
    }
}

/// Build the full catalog for `app`.
pub fn registry(app: &AppConfig, paths: &InstallPaths) -> Result<TargetRegistry> {
    let mut registry = TargetRegistry::new();
    registry.register(mesosphere_repo());
    registry.register(base(app, paths));
    registry.register(zoo(paths));
    registry.register(network_env());
    registry.register(firewall(paths));
    registry.register(mesos(app, paths));
    registry.register(marathon());
    registry.register(chronos());
    registry.register(orchestration(app, paths));
    registry.register(head());
    registry.register(work(app, paths));
    registry.register(core(app, paths)?);
    registry.register(web(app, paths));
    registry.register(status()?);
    registry.register_aggregate(all());
    Ok(registry)
}
