use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::{RedisRole, RedisServer},
};

enum InfoSection {
    Default,
    Replication,
    Unknown,
}

pub struct InfoArguments {
    section: InfoSection,
}

impl InfoArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        let section = match arguments {
            [] => InfoSection::Default,
            [section] => match section.to_lowercase().as_str() {
                "replication" | "all" | "default" | "everything" => InfoSection::Replication,
                _ => InfoSection::Unknown,
            },
            _ => return Err(CommandError::SyntaxError),
        };

        Ok(Self { section })
    }
}

/// Builds the `# Replication` section.
pub fn replication_section(server: &RedisServer) -> String {
    let mut lines = vec!["# Replication".to_string()];

    match &server.config.role {
        RedisRole::Master => {
            let replicas = server.replication.replicas();

            lines.push("role:master".to_string());
            lines.push(format!("connected_slaves:{}", replicas.len()));

            for (index, replica) in replicas.iter().enumerate() {
                let host = replica
                    .address
                    .rsplit_once(':')
                    .map_or(replica.address.as_str(), |(host, _)| host);

                lines.push(format!(
                    "slave{}:ip={},port={},state=online,offset={},lag=0",
                    index,
                    host,
                    replica.listening_port.unwrap_or_default(),
                    replica.acknowledged_offset
                ));
            }
        }
        RedisRole::Replica { host, port } => {
            lines.push("role:slave".to_string());
            lines.push(format!("master_host:{}", host));
            lines.push(format!("master_port:{}", port));
            lines.push("master_link_status:up".to_string());
        }
    }

    lines.push(format!(
        "master_replid:{}",
        server.replication.replication_id()
    ));
    lines.push(format!(
        "master_repl_offset:{}",
        server.replication.offset()
    ));

    lines.join("\r\n")
}

/// Handles the Redis INFO command. Only the replication section has content.
pub fn info(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let info_arguments = InfoArguments::parse(arguments)?;

    let body = match info_arguments.section {
        InfoSection::Default | InfoSection::Replication => replication_section(server),
        InfoSection::Unknown => String::new(),
    };

    Ok(CommandResult::Response(RespValue::BulkString(body)))
}

pub struct Info;

impl Command for Info {
    fn name(&self) -> &'static str {
        "INFO"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { info(server, arguments) })
    }
}
