//! Bot commands and the menu registered with Telegram

use teloxide::utils::command::BotCommands;

use crate::dialogue::FlowKind;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Comandos disponibles:")]
pub enum Command {
    #[command(description = "Inicio y ayuda")]
    Start,
    #[command(description = "Registrar actividades de hoy")]
    RegistrarDiaActual,
    #[command(description = "Registrar un día anterior")]
    RegistrarOtroDia,
    #[command(description = "Ver registros de una fecha")]
    RecuperarRegistroPorFecha,
    #[command(description = "Resumen semanal")]
    VerSemana,
    #[command(description = "Generar reporte XLSX del mes")]
    GenerarReporte,
    #[command(description = "Eliminar un registro")]
    EliminarRegistro,
    #[command(description = "Cancelar la operación en curso")]
    Cancelar,
}

impl Command {
    /// The multi-step flow this command starts, if any
    pub fn flow(&self) -> Option<FlowKind> {
        match self {
            Command::RegistrarDiaActual => Some(FlowKind::RegisterToday),
            Command::RegistrarOtroDia => Some(FlowKind::RegisterOtherDay),
            Command::RecuperarRegistroPorFecha => Some(FlowKind::QueryByDate),
            Command::GenerarReporte => Some(FlowKind::MonthlyReport),
            Command::EliminarRegistro => Some(FlowKind::DeleteRecord),
            Command::Start | Command::VerSemana | Command::Cancelar => None,
        }
    }
}

/// Commands listed in the welcome message, with their description keys
pub const WELCOME_COMMANDS: [(&str, &str); 6] = [
    ("registrar_dia_actual", "cmd-registrar-dia-actual"),
    ("registrar_otro_dia", "cmd-registrar-otro-dia"),
    ("recuperar_registro_por_fecha", "cmd-recuperar-registro-por-fecha"),
    ("ver_semana", "cmd-ver-semana"),
    ("generar_reporte", "cmd-generar-reporte"),
    ("eliminar_registro", "cmd-eliminar-registro"),
];
