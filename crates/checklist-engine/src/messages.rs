//! User-facing bot texts.

use database::{Cadence, Checklist, ChecklistItem, ChecklistState, Progress};

pub const LOGIN_PROMPT: &str =
    "🔐 Envie seu código de operador (ex.: OP0001) ou escaneie o QR code do seu crachá.";

pub const LOGIN_REJECTED: &str =
    "🚫 Código não reconhecido ou operador inativo. Procure seu supervisor.";

pub const LOGIN_FIRST: &str =
    "📌 QR code registrado. Faça login com seu código de operador para continuar.";

pub const SESSION_EXPIRED: &str = "⌛ Sua sessão expirou por inatividade.";

pub const ACCESS_REVOKED: &str =
    "🔒 Seu acesso ao bot foi desativado. Envie seu código de operador para entrar novamente.";

pub const ALREADY_LOGGED_IN: &str = "Você já está conectado. Use /logout para trocar de operador.";

pub const LOGGED_OUT: &str = "👋 Sessão encerrada. Até logo!";

pub const MENU_HINT: &str =
    "Escaneie o QR code de um equipamento ou use /checklist para escolher um.";

pub const UNKNOWN_INPUT: &str = "Não entendi. Use /help para ver os comandos.";

pub const ANSWER_HINT: &str = "Responda com os botões ou envie OK, NOK <observação> ou NA.";

pub const OBSERVATION_REQUIRED: &str =
    "⚠️ Item não conforme: observação obrigatória.\nDescreva o problema encontrado em uma mensagem.";

pub const NA_NOT_ALLOWED: &str = "⚠️ Este item não aceita NA.";

pub const STALE_ITEM: &str = "⚠️ Este item não é o atual. Continue pelo item abaixo.";

pub const NO_ACTIVE_CHECKLIST: &str = "Nenhum checklist em andamento.";

pub const NO_EQUIPMENT: &str = "Nenhum equipamento NR12 liberado para você.";

pub const NO_PERMISSION: &str = "🚫 Você não tem permissão para realizar checklists.";

pub const NOT_AUTHORIZED_EQUIPMENT: &str = "🚫 Você não tem acesso a este equipamento.";

pub const HELD_BY_OTHER: &str = "🔒 Este checklist está em uso por outro operador.";

pub const CANCEL_REFUSED: &str =
    "⚠️ Só o responsável pode cancelar um checklist que ainda não foi concluído.";

pub const CANCELLED: &str = "🗑️ Checklist cancelado.";

pub const PAUSED: &str = "⏸️ Checklist pausado. Ele continua em andamento e pode ser retomado.";

pub const PHOTO_IGNORED: &str = "📷 Foto recebida, mas não há observação pendente.";

pub const INVALID_ACTION: &str = "⚠️ Ação inválida neste momento.";

pub const NOT_FOUND: &str = "❓ Registro não encontrado.";

pub const TRY_AGAIN: &str = "⏳ Falha temporária ao salvar. Por favor, tente novamente.";

pub const CANNOT_CREATE: &str =
    "❌ Não é possível criar o checklist: o tipo do equipamento não tem itens cadastrados.";

pub const SELECT_EQUIPMENT: &str = "Selecione o equipamento:";

pub const HELP_TEXT: &str = "\
📖 Comandos disponíveis:
/checklist - escolher um equipamento
/status - progresso do checklist atual
/pause - pausar o checklist atual
/cancel - cancelar o checklist atual
/logout - encerrar a sessão
/help - esta mensagem

Durante o checklist responda com os botões ou envie OK, NOK <observação> ou NA.";

pub fn welcome(name: &str) -> String {
    format!("✅ Olá, {}! Login realizado.", name)
}

pub fn cadence_label(cadence: Cadence) -> &'static str {
    match cadence {
        Cadence::Daily => "Diário",
        Cadence::Weekly => "Semanal",
        Cadence::Monthly => "Mensal",
    }
}

pub fn state_label(state: ChecklistState) -> &'static str {
    match state {
        ChecklistState::Pending => "Pendente",
        ChecklistState::InProgress => "Em andamento",
        ChecklistState::Completed => "Concluído",
        ChecklistState::Cancelled => "Cancelado",
    }
}

/// One line describing a checklist.
pub fn checklist_line(chk: &Checklist, progress: &Progress) -> String {
    format!(
        "• {} {}: {} ({}/{}, {}%)",
        cadence_label(chk.cadence),
        chk.date.format("%d/%m/%Y"),
        state_label(chk.state),
        progress.answered,
        progress.total,
        progress.percent()
    )
}

pub fn equipment_header(name: &str) -> String {
    format!("🔧 {}\nChecklists de hoje:", name)
}

pub fn no_checklist_today(name: &str) -> String {
    format!("🔧 {}\nNenhum checklist para hoje.", name)
}

/// The prompt for one item.
pub fn item_prompt(item: &ChecklistItem, position: i64, total: i64) -> String {
    let mut text = format!("Item {}/{}\n\n{}", position, total, item.text);
    if !item.description.is_empty() {
        text.push('\n');
        text.push_str(&item.description);
    }
    text
}

pub fn completed(needs_maintenance: bool, alerts: usize) -> String {
    let mut text = String::from("✅ Checklist concluído!");
    if needs_maintenance {
        text.push_str("\n⚠️ Há itens não conformes; a manutenção foi sinalizada.");
    }
    if alerts > 0 {
        text.push_str(&format!("\n🔔 {} alerta(s) de manutenção gerado(s).", alerts));
    }
    text
}

pub fn status(name: &str, chk: &Checklist, progress: &Progress) -> String {
    format!("📋 {}\n{}", name, checklist_line(chk, progress))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_summary() {
        assert_eq!(completed(false, 0), "✅ Checklist concluído!");
        let text = completed(true, 2);
        assert!(text.contains("não conformes"));
        assert!(text.contains("2 alerta(s)"));
    }

    #[test]
    fn test_observation_prompt_wording() {
        assert!(OBSERVATION_REQUIRED.contains("observação obrigatória"));
    }
}
