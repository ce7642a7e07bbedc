// src/services/contact_roster.rs

use validator::ValidateEmail;

use crate::{
    common::{
        error::AppError,
        format::{capitalize_words, format_phone},
    },
    models::account::{Contact, ContactFieldUpdate, FieldStatus, Phone, PhoneFieldUpdate},
};

/// Lista editável de contatos de um rascunho.
///
/// Nada é removido: "apagar" é sempre arquivar, então os índices são estáveis.
/// No máximo um contato não arquivado tem `is_job_contact`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRoster {
    contacts: Vec<Contact>,
    active: usize,
    email_status: Vec<FieldStatus>,
}

impl ContactRoster {
    pub fn new(contacts: Vec<Contact>) -> Self {
        let email_status = vec![FieldStatus::Pristine; contacts.len()];
        let mut roster = Self {
            contacts,
            active: 0,
            email_status,
        };
        roster.active = roster.first_active().unwrap_or(0);
        roster
    }

    // Normaliza contatos recebidos na criação da conta: nomes capitalizados,
    // telefones formatados, ao menos um telefone e exatamente um contato de obra.
    pub fn normalized(contacts: Vec<Contact>) -> Vec<Contact> {
        let mut contacts: Vec<Contact> = contacts
            .into_iter()
            .map(|mut contact| {
                contact.name = capitalize_words(contact.name.trim());
                contact.email = contact.email.trim().to_string();
                if contact.phones.is_empty() {
                    contact.phones.push(Phone::default());
                }
                for phone in &mut contact.phones {
                    phone.number = format_phone(&phone.number);
                }
                if contact.is_archived {
                    contact.is_job_contact = false;
                }
                contact
            })
            .collect();

        let default_index = contacts
            .iter()
            .position(|c| c.is_job_contact && !c.is_archived)
            .or_else(|| contacts.iter().position(|c| !c.is_archived));
        for (index, contact) in contacts.iter_mut().enumerate() {
            contact.is_job_contact = Some(index) == default_index;
        }
        contacts
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn email_status(&self) -> &[FieldStatus] {
        &self.email_status
    }

    fn first_active(&self) -> Option<usize> {
        self.contacts.iter().position(|c| !c.is_archived)
    }

    fn contact_mut(&mut self, index: usize) -> Result<&mut Contact, AppError> {
        self.contacts.get_mut(index).ok_or(AppError::ContactNotFound(index))
    }

    // Novo contato vazio (com um telefone), já ativo. Só vira contato de obra
    // se nenhum outro contato não arquivado tiver a marca.
    pub fn add_contact(&mut self) -> usize {
        let has_default = self.contacts.iter().any(|c| c.is_job_contact && !c.is_archived);
        self.contacts.push(Contact {
            is_job_contact: !has_default,
            ..Contact::default()
        });
        self.email_status.push(FieldStatus::Pristine);
        self.active = self.contacts.len() - 1;
        self.active
    }

    pub fn select_contact(&mut self, index: usize) -> Result<(), AppError> {
        if self.contact_mut(index)?.is_archived {
            return Err(AppError::ContactArchived(index));
        }
        self.active = index;
        Ok(())
    }

    // Exclusividade estrutural: marca `index` e desmarca todos os outros.
    pub fn set_default_contact(&mut self, index: usize) -> Result<(), AppError> {
        if self.contact_mut(index)?.is_archived {
            return Err(AppError::ContactArchived(index));
        }
        for (i, contact) in self.contacts.iter_mut().enumerate() {
            contact.is_job_contact = i == index;
        }
        Ok(())
    }

    pub fn archive_contact(&mut self, index: usize) -> Result<(), AppError> {
        let contact = self.contact_mut(index)?;
        if contact.is_archived {
            return Ok(());
        }

        let remaining = self
            .contacts
            .iter()
            .enumerate()
            .filter(|(i, c)| *i != index && !c.is_archived)
            .count();
        if remaining == 0 {
            return Err(AppError::LastActiveContact);
        }

        let was_default = self.contacts[index].is_job_contact;
        self.contacts[index].is_archived = true;
        self.contacts[index].is_job_contact = false;

        // Promove o primeiro contato restante, pela ordem da lista
        if was_default {
            if let Some(next) = self.first_active() {
                self.contacts[next].is_job_contact = true;
            }
        }

        self.active = self.first_active().unwrap_or(0);
        Ok(())
    }

    // Desarquiva sem reavaliar o contato de obra.
    // Contato que não está arquivado: nada muda, nem o ativo
    pub fn restore_contact(&mut self, index: usize) -> Result<(), AppError> {
        let contact = self.contact_mut(index)?;
        if !contact.is_archived {
            return Ok(());
        }
        contact.is_archived = false;
        self.active = index;
        Ok(())
    }

    pub fn add_phone(&mut self, contact_index: usize) -> Result<usize, AppError> {
        let contact = self.contact_mut(contact_index)?;
        contact.phones.push(Phone::default());
        Ok(contact.phones.len() - 1)
    }

    pub fn update_contact_field(&mut self, index: usize, update: ContactFieldUpdate) -> Result<(), AppError> {
        let contact = self.contact_mut(index)?;
        match update {
            ContactFieldUpdate::Name(name) => contact.name = capitalize_words(&name),
            ContactFieldUpdate::Email(email) => {
                let status = email_status(&email);
                contact.email = email;
                self.email_status[index] = status;
            }
        }
        Ok(())
    }

    pub fn update_phone_field(
        &mut self,
        contact_index: usize,
        phone_index: usize,
        update: PhoneFieldUpdate,
    ) -> Result<(), AppError> {
        let phone = self
            .contact_mut(contact_index)?
            .phones
            .get_mut(phone_index)
            .ok_or(AppError::PhoneNotFound {
                contact: contact_index,
                phone: phone_index,
            })?;

        match update {
            PhoneFieldUpdate::Kind(kind) => phone.kind = kind,
            // O número sempre passa pelo formatador antes de ser guardado
            PhoneFieldUpdate::Number(number) => phone.number = format_phone(&number),
            PhoneFieldUpdate::SmsOk(sms_ok) => phone.sms_ok = sms_ok,
        }
        Ok(())
    }
}

// Status visual do e-mail. Vazio é `Pristine`; nunca bloqueia o salvamento.
pub fn email_status(email: &str) -> FieldStatus {
    if email.is_empty() {
        FieldStatus::Pristine
    } else if email.validate_email() {
        FieldStatus::Valid
    } else {
        FieldStatus::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Contact {
        Contact {
            name: name.to_string(),
            ..Contact::default()
        }
    }

    fn roster_of(names: &[&str]) -> ContactRoster {
        let contacts = names.iter().map(|n| named(n)).collect();
        ContactRoster::new(ContactRoster::normalized(contacts))
    }

    fn defaults(roster: &ContactRoster) -> Vec<usize> {
        roster
            .contacts()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_job_contact && !c.is_archived)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn first_contact_becomes_default_on_normalize() {
        let roster = roster_of(&["ann", "bob"]);
        assert_eq!(defaults(&roster), vec![0]);
        assert_eq!(roster.contacts()[0].name, "Ann");
    }

    #[test]
    fn add_contact_is_default_only_when_none_is() {
        let mut roster = ContactRoster::new(vec![]);
        let first = roster.add_contact();
        assert!(roster.contacts()[first].is_job_contact);

        let second = roster.add_contact();
        assert!(!roster.contacts()[second].is_job_contact);
        assert_eq!(roster.active_index(), second);
        assert_eq!(roster.contacts()[second].phones.len(), 1);
    }

    #[test]
    fn set_default_is_mutually_exclusive() {
        let mut roster = roster_of(&["a", "b", "c"]);
        roster.set_default_contact(2).unwrap();
        assert_eq!(defaults(&roster), vec![2]);
    }

    #[test]
    fn archiving_the_default_promotes_the_first_remaining() {
        let mut roster = roster_of(&["a", "b", "c"]);
        roster.set_default_contact(0).unwrap();
        roster.archive_contact(0).unwrap();

        assert_eq!(defaults(&roster), vec![1]);
        assert_eq!(roster.active_index(), 1);
        assert_eq!(roster.contacts().len(), 3, "archive never removes");
    }

    #[test]
    fn restore_does_not_create_a_second_default() {
        let mut roster = roster_of(&["a", "b"]);
        roster.archive_contact(0).unwrap();
        roster.restore_contact(0).unwrap();

        assert_eq!(defaults(&roster), vec![1]);
        assert_eq!(roster.active_index(), 0);
    }

    #[test]
    fn restoring_a_contact_that_is_not_archived_changes_nothing() {
        let mut roster = roster_of(&["a", "b"]);
        roster.select_contact(1).unwrap();
        let before = roster.clone();

        roster.restore_contact(0).unwrap();
        assert_eq!(roster, before);
        assert_eq!(roster.active_index(), 1);
        assert!(matches!(roster.restore_contact(5), Err(AppError::ContactNotFound(5))));
    }

    #[test]
    fn archiving_the_last_active_contact_is_refused() {
        let mut roster = roster_of(&["a", "b"]);
        roster.archive_contact(1).unwrap();
        assert!(matches!(roster.archive_contact(0), Err(AppError::LastActiveContact)));
        assert!(!roster.contacts()[0].is_archived);
    }

    #[test]
    fn archived_contacts_cannot_become_default_or_active() {
        let mut roster = roster_of(&["a", "b"]);
        roster.archive_contact(1).unwrap();
        assert!(matches!(roster.set_default_contact(1), Err(AppError::ContactArchived(1))));
        assert!(matches!(roster.select_contact(1), Err(AppError::ContactArchived(1))));
    }

    #[test]
    fn phone_numbers_are_formatted_on_update() {
        let mut roster = roster_of(&["a"]);
        let phone = roster.add_phone(0).unwrap();
        roster
            .update_phone_field(0, phone, PhoneFieldUpdate::Number("5551234567".into()))
            .unwrap();
        roster.update_phone_field(0, phone, PhoneFieldUpdate::SmsOk(true)).unwrap();

        let stored = &roster.contacts()[0].phones[phone];
        assert_eq!(stored.number, "(555) 123-4567");
        assert!(stored.sms_ok);
    }

    #[test]
    fn email_updates_track_status() {
        let mut roster = roster_of(&["a"]);
        assert_eq!(roster.email_status()[0], FieldStatus::Pristine);

        roster.update_contact_field(0, ContactFieldUpdate::Email("nope".into())).unwrap();
        assert_eq!(roster.email_status()[0], FieldStatus::Invalid);

        roster
            .update_contact_field(0, ContactFieldUpdate::Email("ann@example.com".into()))
            .unwrap();
        assert_eq!(roster.email_status()[0], FieldStatus::Valid);
        assert_eq!(roster.contacts()[0].email, "ann@example.com");
    }

    #[test]
    fn out_of_range_indexes_are_not_found() {
        let mut roster = roster_of(&["a"]);
        assert!(matches!(roster.archive_contact(5), Err(AppError::ContactNotFound(5))));
        assert!(matches!(
            roster.update_phone_field(0, 3, PhoneFieldUpdate::SmsOk(true)),
            Err(AppError::PhoneNotFound { contact: 0, phone: 3 })
        ));
    }
}
