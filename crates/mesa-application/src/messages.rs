//! Reply text, per language.
//!
//! All user-facing wording lives here so handlers stay focused on
//! transitions. Argentine and peninsular Spanish differ only where the
//! voseo matters.

use mesa_core::contract::{Button, tokens};
use mesa_core::session::{Language, Need};
use mesa_core::turn::{Violation, ViolationCode};

pub fn greeting() -> String {
    "¡Hola! Soy el asistente de soporte técnico. / Hi! I'm the tech support assistant.\n\
     Elegí tu idioma / Elige tu idioma / Choose your language:"
        .to_string()
}

pub fn ask_name(lang: Language) -> String {
    match lang {
        Language::EsAr => "¡Buenísimo! ¿Cómo te llamás? (si preferís no decirlo, escribí \"anónimo\")".to_string(),
        Language::EsEs => "¡Perfecto! ¿Cómo te llamas? (si prefieres no decirlo, escribe \"anónimo\")".to_string(),
        Language::En => "Great! What's your name? (type \"skip\" if you'd rather not say)".to_string(),
    }
}

pub fn ask_need(lang: Language, name: Option<&str>) -> String {
    let salute = match (lang, name) {
        (Language::En, Some(n)) => format!("Nice to meet you, {n}! "),
        (Language::En, None) => "All right! ".to_string(),
        (_, Some(n)) => format!("¡Un gusto, {n}! "),
        (_, None) => "¡Perfecto! ".to_string(),
    };
    let question = match lang {
        Language::EsAr => "¿Qué necesitás hoy?",
        Language::EsEs => "¿Qué necesitas hoy?",
        Language::En => "What do you need today?",
    };
    format!("{salute}{question}")
}

pub fn need_buttons(lang: Language) -> Vec<Button> {
    let (help, task) = match lang {
        Language::En => ("Something is broken", "I want to do something"),
        _ => ("Tengo un problema", "Quiero hacer algo"),
    };
    vec![
        Button::new(tokens::HELP, help, 0),
        Button::new(tokens::TASK, task, 1),
    ]
}

pub fn ask_problem(lang: Language, need: Need) -> String {
    match (lang, need) {
        (Language::EsAr, Need::Help) => "Contame qué está pasando, con tus palabras.".to_string(),
        (Language::EsEs, Need::Help) => "Cuéntame qué está pasando, con tus palabras.".to_string(),
        (Language::En, Need::Help) => "Tell me what's going on, in your own words.".to_string(),
        (Language::EsAr, Need::Task) => "Contame qué querés lograr.".to_string(),
        (Language::EsEs, Need::Task) => "Cuéntame qué quieres lograr.".to_string(),
        (Language::En, Need::Task) => "Tell me what you'd like to get done.".to_string(),
    }
}

pub fn ask_device(lang: Language) -> String {
    match lang {
        Language::EsAr => "Entiendo. ¿Con qué equipo estamos? Decime marca y modelo si los tenés a mano.".to_string(),
        Language::EsEs => "Entiendo. ¿Con qué equipo estamos? Dime marca y modelo si los tienes a mano.".to_string(),
        Language::En => "Got it. Which device are we working with? Brand and model if you have them handy.".to_string(),
    }
}

pub fn basic_tests(lang: Language) -> String {
    match lang {
        Language::En => "Let's try the basics first:\n\
             1. Unplug the device, wait 30 seconds, plug it back in.\n\
             2. Check every cable is firmly seated.\n\
             3. Restart it and watch for lights or sounds.\n\
             How did it go?"
            .to_string(),
        _ => "Probemos lo básico primero:\n\
             1. Desenchufá/desenchufa el equipo, esperá 30 segundos y volvé a enchufarlo.\n\
             2. Revisá que todos los cables estén firmes.\n\
             3. Reinicialo y fijate si hay luces o sonidos.\n\
             ¿Cómo fue?"
            .to_string(),
    }
}

pub fn advanced_tests(lang: Language) -> String {
    match lang {
        Language::En => "Okay, let's go deeper:\n\
             1. Try a different power outlet and cable.\n\
             2. Disconnect all peripherals and retry.\n\
             3. If it boots, note any error message exactly as shown.\n\
             How did it go?"
            .to_string(),
        _ => "Bien, vamos un paso más:\n\
             1. Probá con otro enchufe y otro cable.\n\
             2. Desconectá todos los periféricos e intentá de nuevo.\n\
             3. Si arranca, anotá cualquier mensaje de error tal cual aparece.\n\
             ¿Cómo fue?"
            .to_string(),
    }
}

pub fn tests_buttons(lang: Language) -> Vec<Button> {
    let (done, fail, solved) = match lang {
        Language::En => ("Did them, still broken", "Couldn't do them", "It's fixed!"),
        _ => ("Hice las pruebas, sigue igual", "No pude hacerlas", "¡Se solucionó!"),
    };
    vec![
        Button::new(tokens::TESTS_DONE, done, 0),
        Button::new(tokens::TESTS_FAIL, fail, 1),
        Button::new(tokens::SOLVED, solved, 2),
    ]
}

pub fn escalate_offer(lang: Language) -> String {
    match lang {
        Language::EsAr => "¿Querés que un especialista siga el caso? Te armo un ticket con todo lo que me contaste.".to_string(),
        Language::EsEs => "¿Quieres que un especialista siga el caso? Te creo un ticket con todo lo que me contaste.".to_string(),
        Language::En => "Want a specialist to take over? I'll open a ticket with everything you told me.".to_string(),
    }
}

pub fn escalate_buttons(lang: Language) -> Vec<Button> {
    let (yes, no) = match lang {
        Language::En => ("Yes, open a ticket", "No, keep trying"),
        _ => ("Sí, crear ticket", "No, sigo probando"),
    };
    vec![
        Button::new(tokens::YES, yes, 0),
        Button::new(tokens::NO, no, 1),
    ]
}

pub fn ask_email(lang: Language) -> String {
    match lang {
        Language::EsAr => "Dale. ¿A qué email te contactamos?".to_string(),
        Language::EsEs => "Perfecto. ¿A qué email te contactamos?".to_string(),
        Language::En => "Sure. What email should we use to reach you?".to_string(),
    }
}

pub fn email_retry(lang: Language) -> String {
    match lang {
        Language::En => "That doesn't look like an email address. Could you retype it?".to_string(),
        _ => "Eso no parece un email. ¿Lo escribís de nuevo?".to_string(),
    }
}

pub fn ask_phone(lang: Language) -> String {
    match lang {
        Language::En => "And a phone number, with area code?".to_string(),
        _ => "¿Y un teléfono, con código de área?".to_string(),
    }
}

pub fn phone_retry(lang: Language) -> String {
    match lang {
        Language::En => "That doesn't look like a phone number. Could you retype it?".to_string(),
        _ => "Eso no parece un teléfono. ¿Lo escribís de nuevo?".to_string(),
    }
}

pub fn ticket_created(lang: Language, ticket_id: &str) -> String {
    match lang {
        Language::EsAr => format!(
            "¡Listo! Tu ticket es {ticket_id}. Un especialista te va a escribir a la brevedad. ¡Gracias por la paciencia!"
        ),
        Language::EsEs => format!(
            "¡Listo! Tu ticket es {ticket_id}. Un especialista te escribirá a la brevedad. ¡Gracias por la paciencia!"
        ),
        Language::En => format!(
            "Done! Your ticket is {ticket_id}. A specialist will reach out shortly. Thanks for your patience!"
        ),
    }
}

pub fn ticket_reminder(lang: Language, ticket_id: Option<&str>) -> String {
    let id = ticket_id.unwrap_or("—");
    match lang {
        Language::En => format!("Your ticket {id} is already open; a specialist will contact you."),
        _ => format!("Tu ticket {id} ya está abierto; un especialista te va a contactar."),
    }
}

pub fn closed_thanks(lang: Language) -> String {
    match lang {
        Language::EsAr => "¡Genial que se haya solucionado! Cualquier cosa, volvé a escribirme.".to_string(),
        Language::EsEs => "¡Genial que se haya solucionado! Cualquier cosa, vuelve a escribirme.".to_string(),
        Language::En => "Glad it's fixed! Message me again any time.".to_string(),
    }
}

pub fn closed_reminder(lang: Language) -> String {
    match lang {
        Language::En => "This conversation is closed. Start a new one if you need anything else.".to_string(),
        _ => "Esta conversación ya está cerrada. Iniciá una nueva si necesitás algo más.".to_string(),
    }
}

/// Polite correction for a contract violation, phrased for the stage's
/// input mode.
pub fn rejection_reply(lang: Language, violation: &Violation) -> String {
    match violation.code {
        ViolationCode::TextNotAllowed => match lang {
            Language::EsAr => "Acá necesito que elijas una de las opciones de abajo.".to_string(),
            Language::EsEs => "Aquí necesito que elijas una de las opciones de abajo.".to_string(),
            Language::En => "Here I need you to pick one of the options below.".to_string(),
        },
        ViolationCode::ButtonNotAllowed => match lang {
            Language::EsAr => "En este paso escribime con tus palabras, sin botones.".to_string(),
            Language::EsEs => "En este paso escríbeme con tus palabras, sin botones.".to_string(),
            Language::En => "For this step, just type your answer — no buttons here.".to_string(),
        },
        ViolationCode::UnknownButtonToken => match lang {
            Language::En => "That option doesn't belong to this step. Use the ones below.".to_string(),
            _ => "Esa opción no corresponde a este paso. Usá las de abajo.".to_string(),
        },
        _ => malformed_reply(lang),
    }
}

pub fn malformed_reply(lang: Language) -> String {
    match lang {
        Language::En => "I couldn't read that message. Send either text or one button press.".to_string(),
        _ => "No pude leer ese mensaje. Mandá texto o un botón, pero no ambos.".to_string(),
    }
}

pub fn fault_reply(lang: Language) -> String {
    match lang {
        Language::En => "Something went wrong on my side. Nothing was lost — please try that again.".to_string(),
        _ => "Algo falló de mi lado. No se perdió nada — probá de nuevo, por favor.".to_string(),
    }
}

pub fn duplicate_ack(lang: Language) -> String {
    match lang {
        Language::En => "Already on it — I received that message.".to_string(),
        _ => "Ya lo estoy procesando — ese mensaje me llegó.".to_string(),
    }
}
